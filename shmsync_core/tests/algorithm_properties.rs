// Cross-thread properties of the three exclusion strategies
use shmsync_core::consistency::{is_consistent, PetersonFlags, TasFlag};
use shmsync_core::{
    Algorithm, Outcome, ReaderEndpoint, ResumeState, Role, SharedBuffer, WriterEndpoint,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

const WRITES: i32 = 20_000;

/// Hammer one buffer from a writer thread while the reader polls; returns
/// every successful snapshot's first element plus (made, missed) read counts.
fn contend(algorithm: Algorithm, len: usize) -> (Vec<i32>, u64, u64, u64) {
    let buffer = SharedBuffer::allocate(algorithm, len).unwrap();
    let mut writer = WriterEndpoint::attach(&buffer).unwrap();
    let mut reader = ReaderEndpoint::attach(&buffer).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer_done = done.clone();
    let writer_thread = thread::spawn(move || {
        let mut missed = 0u64;
        let mut local = vec![0; len];
        for k in 1..=WRITES {
            local.fill(k);
            if writer.try_write(&local) == Outcome::Missed {
                missed += 1;
            }
        }
        writer_done.store(true, Ordering::Release);
        missed
    });

    let mut seen = Vec::new();
    let mut torn = 0u64;
    let mut missed_reads = 0u64;
    while !done.load(Ordering::Acquire) {
        match reader.try_read() {
            Outcome::Success => {
                if is_consistent(reader.snapshot()) {
                    seen.push(reader.snapshot()[0]);
                } else {
                    torn += 1;
                }
            }
            Outcome::Missed => missed_reads += 1,
        }
    }
    let missed_writes = writer_thread.join().unwrap();
    assert_eq!(torn, 0, "{} reported success on torn data", algorithm);
    (seen, missed_reads, missed_writes, torn)
}

#[test]
fn head_tail_success_is_never_torn() {
    for len in [2, 3, 64, 1000] {
        let (seen, _, missed_writes, torn) = contend(Algorithm::HeadTail, len);
        assert_eq!(torn, 0);
        assert_eq!(missed_writes, 0, "head/tail writer must never miss");
        assert!(seen.iter().all(|&k| (0..=WRITES).contains(&k)));
    }
}

#[test]
fn successful_reads_only_move_forward() {
    for algorithm in Algorithm::ALL {
        let (seen, _, _, _) = contend(algorithm, 256);
        assert!(
            seen.windows(2).all(|w| w[1] >= w[0]),
            "{} returned an older generation after a newer one",
            algorithm
        );
    }
}

#[test]
fn test_and_set_never_double_acquires() {
    let flag = Arc::new(TasFlag::default());
    let holders = Arc::new(AtomicU32::new(0));
    let overlaps = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let flag = flag.clone();
            let holders = holders.clone();
            let overlaps = overlaps.clone();
            thread::spawn(move || {
                let mut acquired = 0u64;
                for _ in 0..200_000 {
                    if let Some(_guard) = flag.try_acquire() {
                        if holders.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        acquired += 1;
                        holders.fetch_sub(1, Ordering::SeqCst);
                    }
                }
                acquired
            })
        })
        .collect();

    let acquired: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(acquired > 0);
    assert!(!flag.is_held());
}

#[test]
fn peterson_admits_one_side_at_a_time() {
    let flags = Arc::new(PetersonFlags::default());
    let inside = Arc::new(AtomicU32::new(0));
    let overlaps = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = [Role::Reader, Role::Writer]
        .into_iter()
        .map(|role| {
            let flags = flags.clone();
            let inside = inside.clone();
            let overlaps = overlaps.clone();
            thread::spawn(move || {
                let mut resume = ResumeState::Fresh;
                for _ in 0..200_000 {
                    if let Some(_guard) = flags.try_enter(role, &mut resume) {
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn peterson_retrying_side_is_overtaken_at_most_once() {
    let flags = Arc::new(PetersonFlags::default());
    // Entries completed by each side, indexed by role
    let entries = Arc::new([AtomicU64::new(0), AtomicU64::new(0)]);
    let worst = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = [(Role::Reader, 0usize), (Role::Writer, 1usize)]
        .into_iter()
        .map(|(role, me)| {
            let flags = flags.clone();
            let entries = entries.clone();
            let worst = worst.clone();
            thread::spawn(move || {
                let other = 1 - me;
                let mut resume = ResumeState::Fresh;
                let mut refused_at: Option<u64> = None;
                for _ in 0..100_000 {
                    match flags.try_enter(role, &mut resume) {
                        Some(_guard) => {
                            entries[me].fetch_add(1, Ordering::SeqCst);
                            if let Some(start) = refused_at.take() {
                                let overtaken = entries[other].load(Ordering::SeqCst) - start;
                                worst.fetch_max(overtaken, Ordering::SeqCst);
                            }
                        }
                        None => {
                            if refused_at.is_none() {
                                refused_at = Some(entries[other].load(Ordering::SeqCst));
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(worst.load(Ordering::SeqCst) <= 1);
}

#[test]
fn written_heartbeat_reads_back_unchanged() {
    for algorithm in Algorithm::ALL {
        let buffer = SharedBuffer::allocate(algorithm, 1000).unwrap();
        let mut writer = WriterEndpoint::attach(&buffer).unwrap();
        let mut reader = ReaderEndpoint::attach(&buffer).unwrap();

        for k in [1, 2, -7, i32::MAX] {
            assert_eq!(writer.try_write(&vec![k; 1000]), Outcome::Success);
            assert_eq!(reader.try_read(), Outcome::Success);
            assert!(reader.snapshot().iter().all(|&v| v == k));
        }
    }
}
