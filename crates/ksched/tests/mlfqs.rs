//! Integration tests for the feedback-queue engine over the timer path.

mod common;

use std::collections::HashSet;

use ksched::{Fixed, Nice, Priority, SchedError, SchedulerConfig, ThreadId};

fn mlfqs_config() -> SchedulerConfig {
    SchedulerConfig::builder().mlfqs(true).build()
}

#[test]
fn single_busy_thread_converges() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(mlfqs_config())?;

    common::ticks(&mut sched, 4);
    assert_eq!(sched.get_priority(), Priority::new(62));

    common::ticks(&mut sched, 95);
    assert_eq!(sched.ticks(), 99);
    assert_eq!(sched.get_recent_cpu(), 9900);
    assert_eq!(sched.load_avg(), Fixed::ZERO);

    common::ticks(&mut sched, 1);
    // One update with one runnable thread: load_avg = 1/60.
    assert_eq!(sched.load_avg(), Fixed::from_int(1).div_int(60));
    assert_eq!(sched.get_load_avg(), 2);
    // 100 ticks of usage decayed by (2/60)/(2/60 + 1).
    assert_eq!(sched.current().recent_cpu().raw(), 52_800);
    assert_eq!(sched.get_recent_cpu(), 322);
    assert!(sched.get_priority() <= Priority::MAX);
    assert_eq!(sched.current_tid(), ThreadId(1));
    Ok(())
}

#[test]
fn busy_thread_yields_to_a_fresher_one() -> Result<(), SchedError> {
    let (mut sched, probe) = common::booted(mlfqs_config())?;
    let fresh = sched.create("fresh", Priority::new(20), || {})?;
    assert_eq!(sched.current_tid(), ThreadId(1));

    // At the first recompute both are rated; fresh inherited zero usage.
    common::ticks(&mut sched, 4);
    assert_eq!(sched.get_effective_priority(fresh), Priority::MAX);
    assert_eq!(sched.current_tid(), fresh);
    assert_eq!(probe.targets(), vec![fresh]);
    sched.check_invariants();
    Ok(())
}

#[test]
fn niceness_lowers_computed_priority() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(mlfqs_config())?;
    sched.set_nice(Nice::new(-3));
    assert_eq!(sched.get_nice(), Nice::new(-3));

    common::ticks(&mut sched, 4);
    // recent_cpu = -3 + 4 = 1, so 63 - 0 + 6 clamps to the top.
    assert_eq!(sched.get_priority(), Priority::MAX);

    sched.set_nice(Nice::new(10));
    assert_eq!(sched.get_priority(), Priority::new(40));
    Ok(())
}

#[test]
fn heavy_nice_load_reports_large_recent_cpu() -> Result<(), SchedError> {
    let (mut sched, _probe) = common::booted(mlfqs_config())?;
    for _ in 0..40 {
        sched.create("hog", Priority::new(1), || {})?;
    }

    // Every thread turns fully nice the first time it runs, which drives
    // recent_cpu well past the point where 100 * recent_cpu leaves 32 bits.
    let mut niced = HashSet::new();
    let mut peak = 0;
    for _ in 0..20_000 {
        if niced.insert(sched.current_tid()) {
            sched.set_nice(Nice::MAX);
        }
        common::ticks(&mut sched, 1);
        peak = peak.max(sched.get_recent_cpu());
    }

    assert!(sched.get_load_avg() > 3_000, "load_avg {}", sched.get_load_avg());
    assert!(peak > 131_100, "peak recent_cpu {peak}");
    assert_eq!(sched.get_recent_cpu(), sched.current().recent_cpu().hundredths());
    sched.check_invariants();
    Ok(())
}
