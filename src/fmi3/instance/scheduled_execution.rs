use crate::{SE, Status, fmi3::binding, format::G16};

use super::{Instance, call, callbacks::PreemptionScope};

impl Instance<SE> {
    /// Run the model partition of `clock_reference`. Preemption callbacks raised by the unit
    /// during the call are routed to this instance.
    pub fn activate_model_partition(
        &mut self,
        clock_reference: binding::fmi3ValueReference,
        activation_time: f64,
    ) -> Status {
        let status = {
            let _scope = PreemptionScope::enter(&self.environment);
            call!(self.fmi3ActivateModelPartition(clock_reference, activation_time))
        };
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3ActivateModelPartition(clockReference={clock_reference}, \
                 activationTime={})",
                G16(activation_time)
            )
        });
        status
    }
}
