use fnv::FnvHashMap;
use vela_api::{
    VelaCommandList, VelaResourceBarrier, VelaResourceId, VelaResourceState, VelaResult,
};

/// Authoritative record of the state every tracked subresource is left in by submitted work.
///
/// Only `ResourceStateTracker::commit_final_resource_states` changes states. Recordings are
/// reconciled against this tracker one at a time, in submission order.
#[derive(Default, Debug)]
pub struct GlobalResourceStateTracker {
    states: FnvHashMap<VelaResourceId, Vec<VelaResourceState>>,
}

impl GlobalResourceStateTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Start tracking a resource with every subresource in `initial_state`
    pub fn track_resource(
        &mut self,
        resource: VelaResourceId,
        subresource_count: u32,
        initial_state: VelaResourceState,
    ) {
        log::trace!(
            "Tracking {} ({} subresources) in state {:?}",
            resource,
            subresource_count,
            initial_state
        );
        let old = self
            .states
            .insert(resource, vec![initial_state; subresource_count.max(1) as usize]);
        if old.is_some() {
            log::warn!("{} was already tracked, its state was reset", resource);
        }
    }

    pub fn untrack_resource(
        &mut self,
        resource: VelaResourceId,
    ) -> bool {
        log::trace!("Untracking {}", resource);
        self.states.remove(&resource).is_some()
    }

    pub fn is_tracked(
        &self,
        resource: VelaResourceId,
    ) -> bool {
        self.states.contains_key(&resource)
    }

    pub fn tracked_resource_count(&self) -> usize {
        self.states.len()
    }

    pub fn try_state(
        &self,
        resource: VelaResourceId,
        subresource: u32,
    ) -> Option<VelaResourceState> {
        self.states
            .get(&resource)
            .and_then(|x| x.get(subresource as usize))
            .copied()
    }

    /// The last committed state of a subresource. Panics if the resource is not tracked, using an
    /// unregistered resource is a bug in the caller.
    pub fn state(
        &self,
        resource: VelaResourceId,
        subresource: u32,
    ) -> VelaResourceState {
        match self.try_state(resource, subresource) {
            Some(state) => state,
            None => panic!(
                "Subresource {} of {} is not tracked by the global state tracker",
                subresource, resource
            ),
        }
    }

    fn set_state(
        &mut self,
        resource: VelaResourceId,
        subresource: u32,
        state: VelaResourceState,
    ) {
        match self
            .states
            .get_mut(&resource)
            .and_then(|x| x.get_mut(subresource as usize))
        {
            Some(tracked) => *tracked = state,
            None => panic!(
                "Subresource {} of {} is not tracked by the global state tracker",
                subresource, resource
            ),
        }
    }
}

/// A transition whose before-state is unknown until the recording is reconciled
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingResourceBarrier {
    pub resource: VelaResourceId,
    pub subresource: u32,
    pub state_after: VelaResourceState,
}

/// Tracks transitions requested while recording one command list.
///
/// The first transition of a subresource in a recording can't know its before-state, it goes to
/// the pending list and is resolved against the `GlobalResourceStateTracker` right before
/// submission. Later transitions of the same subresource are resolved immediately.
#[derive(Default, Debug)]
pub struct ResourceStateTracker {
    resolved_barriers: Vec<VelaResourceBarrier>,
    pending_barriers: Vec<PendingResourceBarrier>,
    final_states: FnvHashMap<(VelaResourceId, u32), VelaResourceState>,
}

impl ResourceStateTracker {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn resource_barrier(
        &mut self,
        resource: VelaResourceId,
        subresource: u32,
        state_after: VelaResourceState,
    ) {
        let key = (resource, subresource);
        match self.final_states.get(&key) {
            Some(&state_before) if state_before == state_after => {
                log::trace!(
                    "  {}[{}] already in {:?}, no barrier",
                    resource,
                    subresource,
                    state_after
                );
            }
            Some(&state_before) => {
                log::trace!(
                    "  {}[{}] {:?} -> {:?}",
                    resource,
                    subresource,
                    state_before,
                    state_after
                );
                self.resolved_barriers.push(VelaResourceBarrier {
                    resource,
                    subresource,
                    state_before,
                    state_after,
                });
            }
            None => {
                log::trace!(
                    "  {}[{}] ? -> {:?} (pending)",
                    resource,
                    subresource,
                    state_after
                );
                self.pending_barriers.push(PendingResourceBarrier {
                    resource,
                    subresource,
                    state_after,
                });
            }
        }

        self.final_states.insert(key, state_after);
    }

    /// Record every resolved barrier into `command_list`. Returns the number recorded.
    pub fn flush_barriers(
        &mut self,
        command_list: &mut VelaCommandList,
    ) -> VelaResult<usize> {
        let count = self.resolved_barriers.len();
        if count > 0 {
            command_list.resource_barrier(&self.resolved_barriers)?;
            self.resolved_barriers.clear();
        }

        Ok(count)
    }

    /// Resolve pending barriers against the global tracker and record the ones that change
    /// state into `command_list`. Returns the number recorded. A zero count means no
    /// barrier-only submission is needed.
    #[profiling::function]
    pub fn flush_pending_barriers(
        &mut self,
        global: &GlobalResourceStateTracker,
        command_list: &mut VelaCommandList,
    ) -> VelaResult<usize> {
        let mut barriers = Vec::with_capacity(self.pending_barriers.len());
        for pending in self.pending_barriers.drain(..) {
            let state_before = global.state(pending.resource, pending.subresource);
            if state_before != pending.state_after {
                barriers.push(VelaResourceBarrier {
                    resource: pending.resource,
                    subresource: pending.subresource,
                    state_before,
                    state_after: pending.state_after,
                });
            } else {
                log::trace!(
                    "  {}[{}] pending transition to {:?} elided",
                    pending.resource,
                    pending.subresource,
                    pending.state_after
                );
            }
        }

        if !barriers.is_empty() {
            command_list.resource_barrier(&barriers)?;
        }

        Ok(barriers.len())
    }

    /// Publish the state this recording leaves every subresource in
    pub fn commit_final_resource_states(
        &mut self,
        global: &mut GlobalResourceStateTracker,
    ) {
        for ((resource, subresource), state) in self.final_states.drain() {
            global.set_state(resource, subresource, state);
        }
    }

    /// The state a subresource will be in at the end of this recording, if it was touched
    pub fn final_state(
        &self,
        resource: VelaResourceId,
        subresource: u32,
    ) -> Option<VelaResourceState> {
        self.final_states.get(&(resource, subresource)).copied()
    }

    /// Every resource this recording transitions
    pub fn touched_resources(&self) -> Vec<VelaResourceId> {
        let mut resources: Vec<_> = self.final_states.keys().map(|(x, _)| *x).collect();
        resources.sort();
        resources.dedup();
        resources
    }

    pub fn resolved_barrier_count(&self) -> usize {
        self.resolved_barriers.len()
    }

    pub fn pending_barrier_count(&self) -> usize {
        self.pending_barriers.len()
    }

    pub fn reset(&mut self) {
        self.resolved_barriers.clear();
        self.pending_barriers.clear();
        self.final_states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::{VelaApi, VelaCommand, VelaQueueType};

    fn recorded_barriers(command_list: &VelaCommandList) -> Vec<VelaResourceBarrier> {
        command_list
            .null_command_list()
            .unwrap()
            .commands()
            .iter()
            .filter_map(|x| match x {
                VelaCommand::ResourceBarrier(barriers) => Some(barriers.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_second_transition_resolves_locally() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut command_list = api
            .device_context()
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();

        let resource = VelaResourceId(7);
        let mut tracker = ResourceStateTracker::new();
        tracker.resource_barrier(resource, 0, VelaResourceState::RENDER_TARGET);
        tracker.resource_barrier(resource, 0, VelaResourceState::RENDER_TARGET);
        tracker.resource_barrier(resource, 0, VelaResourceState::SHADER_RESOURCE);

        assert_eq!(tracker.pending_barrier_count(), 1);
        assert_eq!(tracker.resolved_barrier_count(), 1);
        assert_eq!(tracker.flush_barriers(&mut command_list).unwrap(), 1);
        assert_eq!(
            recorded_barriers(&command_list),
            vec![VelaResourceBarrier {
                resource,
                subresource: 0,
                state_before: VelaResourceState::RENDER_TARGET,
                state_after: VelaResourceState::SHADER_RESOURCE,
            }]
        );
        assert_eq!(tracker.flush_barriers(&mut command_list).unwrap(), 0);
    }

    #[test]
    fn test_pending_no_op_transition_is_elided() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut command_list = api
            .device_context()
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();

        let resource = VelaResourceId(3);
        let mut global = GlobalResourceStateTracker::new();
        global.track_resource(resource, 1, VelaResourceState::SHADER_RESOURCE);

        let mut tracker = ResourceStateTracker::new();
        tracker.resource_barrier(resource, 0, VelaResourceState::SHADER_RESOURCE);
        assert_eq!(
            tracker
                .flush_pending_barriers(&global, &mut command_list)
                .unwrap(),
            0
        );
        assert!(recorded_barriers(&command_list).is_empty());
    }

    #[test]
    fn test_pending_barrier_uses_global_state_and_commit_publishes() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut command_list = api
            .device_context()
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();

        let resource = VelaResourceId(11);
        let mut global = GlobalResourceStateTracker::new();
        global.track_resource(resource, 2, VelaResourceState::COMMON);

        let mut tracker = ResourceStateTracker::new();
        tracker.resource_barrier(resource, 1, VelaResourceState::DEPTH_WRITE);
        tracker.resource_barrier(resource, 1, VelaResourceState::DEPTH_READ);
        assert_eq!(
            tracker.final_state(resource, 1),
            Some(VelaResourceState::DEPTH_READ)
        );

        assert_eq!(
            tracker
                .flush_pending_barriers(&global, &mut command_list)
                .unwrap(),
            1
        );
        assert_eq!(
            recorded_barriers(&command_list),
            vec![VelaResourceBarrier {
                resource,
                subresource: 1,
                state_before: VelaResourceState::COMMON,
                state_after: VelaResourceState::DEPTH_WRITE,
            }]
        );

        tracker.commit_final_resource_states(&mut global);
        assert_eq!(global.state(resource, 0), VelaResourceState::COMMON);
        assert_eq!(global.state(resource, 1), VelaResourceState::DEPTH_READ);
        assert!(tracker.final_state(resource, 1).is_none());
    }

    #[test]
    #[should_panic(expected = "is not tracked")]
    fn test_untracked_lookup_panics() {
        let global = GlobalResourceStateTracker::new();
        global.state(VelaResourceId(99), 0);
    }
}
