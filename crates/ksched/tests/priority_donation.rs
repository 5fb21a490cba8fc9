//! Integration tests for the donation interface as the locking layer drives it.

mod common;

use ksched::{Priority, PriorityField, ResourceId, SchedError, SchedulerConfig, ThreadId};

const LOCK: ResourceId = ResourceId(0x10);

/// L (20) holds `LOCK`; H (30) blocks on it and donates. Returns `(l, h)`
/// with L running on the donated priority.
fn donate_h_to_l<S: ksched::ContextSwitch>(
    sched: &mut ksched::Scheduler<S>,
) -> Result<(ThreadId, ThreadId), SchedError> {
    let l = sched.create("L", Priority::new(20), || {})?;
    let h = sched.create("H", Priority::new(30), || {})?;
    sched.held_resources_mut(l).push(LOCK);

    // main steps aside so H runs.
    sched.set_priority(Priority::new(10));
    assert_eq!(sched.current_tid(), h);

    sched.set_awaiting_resource(h, Some(LOCK));
    sched.set_donated(l, true);
    let donor = sched.get_priority();
    sched.set_other_priority(l, donor, PriorityField::Effective);
    common::block_current(sched);

    assert_eq!(sched.current_tid(), l);
    Ok((l, h))
}

/// What the locking layer does when L releases `LOCK`.
fn release<S: ksched::ContextSwitch>(sched: &mut ksched::Scheduler<S>, l: ThreadId, h: ThreadId) {
    sched.held_resources_mut(l).retain(|r| *r != LOCK);
    sched.set_awaiting_resource(h, None);
    sched.unblock(h);
    sched.revoke_donation(l);
}

#[test]
fn donation_raises_and_revocation_restores() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(SchedulerConfig::default())?;
    let (l, h) = donate_h_to_l(&mut sched)?;

    assert_eq!(sched.get_effective_priority(l), Priority::new(30));
    assert_eq!(sched.get_base_priority(l), Priority::new(20));
    assert!(sched.is_donated(l));
    assert_eq!(sched.held_resources(l), &[LOCK]);
    assert_eq!(sched.awaiting_resource(h), Some(LOCK));
    sched.check_invariants();

    release(&mut sched, l, h);

    assert_eq!(sched.get_effective_priority(l), Priority::new(20));
    assert!(!sched.is_donated(l));
    assert_eq!(sched.current_tid(), h, "H preempts L once the donation ends");
    assert!(sched.held_resources(l).is_empty());
    sched.check_invariants();
    Ok(())
}

#[test]
fn lowered_base_waits_for_donation_to_end() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(SchedulerConfig::default())?;
    let (l, h) = donate_h_to_l(&mut sched)?;

    sched.set_priority(Priority::new(10));
    assert_eq!(sched.get_effective_priority(l), Priority::new(30));
    assert_eq!(sched.get_base_priority(l), Priority::new(10));
    assert_eq!(sched.current_tid(), l);

    release(&mut sched, l, h);
    assert_eq!(sched.get_effective_priority(l), Priority::new(10));
    assert_eq!(sched.get_base_priority(l), Priority::new(10));
    Ok(())
}

#[test]
fn raising_while_donated_overrides_the_donation() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(SchedulerConfig::default())?;
    let (l, h) = donate_h_to_l(&mut sched)?;

    sched.set_priority(Priority::new(35));
    assert_eq!(sched.get_effective_priority(l), Priority::new(35));
    assert_eq!(sched.get_base_priority(l), Priority::new(20));

    // Revocation falls back to the untouched base, not the requested value.
    release(&mut sched, l, h);
    assert_eq!(sched.get_effective_priority(l), Priority::new(20));
    Ok(())
}

#[test]
fn donation_to_a_ready_holder_requeues_it() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(SchedulerConfig::default())?;
    let low = sched.create("low", Priority::new(5), || {})?;
    let mid = sched.create("mid", Priority::new(15), || {})?;
    assert_eq!(sched.ready_threads().collect::<Vec<_>>(), vec![mid, low]);

    sched.set_donated(low, true);
    sched.set_other_priority(low, Priority::new(25), PriorityField::Effective);

    assert_eq!(sched.ready_threads().collect::<Vec<_>>(), vec![low, mid]);
    assert_eq!(sched.current_tid(), ThreadId(1));
    sched.check_invariants();

    sched.set_other_priority(low, Priority::new(40), PriorityField::Effective);
    assert_eq!(sched.current_tid(), low, "holder outranking the runner preempts it");
    Ok(())
}
