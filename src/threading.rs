use crossbeam::channel::{self, Receiver};
use crossbeam::thread;
use log::debug;
use simple_error::{bail, try_with, SimpleResult};
use std::panic::{self, AssertUnwindSafe};

#[derive(Clone, Copy, Debug)]
pub struct ThreadParam {
    /// The number of threads to run with, the calling thread included
    pub num_threads: u32,
    /// The number of consecutive items a thread grabs at once
    pub batch_size: usize,
}

impl ThreadParam {
    /// Uses every core that `core_affinity` reports (or a single thread if it reports none).
    pub fn all_cores(batch_size: usize) -> Self {
        let num_threads = core_affinity::get_core_ids()
            .map(|ids| ids.len() as u32)
            .unwrap_or(1);
        ThreadParam {
            num_threads: num_threads.max(1),
            batch_size,
        }
    }
}

/// Calls `f(index, &mut items[index])` for every item, spread over `param.num_threads` threads.
/// Every call gets exclusive access to its own item, so as long as `f` only reads shared state
/// the result doesn't depend on the number of threads.
pub fn parallel_for<T, F>(items: &mut [T], param: ThreadParam, f: F) -> SimpleResult<()>
where
    T: Send,
    F: Fn(usize, &mut T) + Sync,
{
    let batch_size = param.batch_size.max(1);

    // All of the work is queued up front. Dropping the sender afterwards means a receiver
    // returns an error exactly when the queue is empty:
    let (sender, receiver) = channel::unbounded();
    for (i, batch) in items.chunks_mut(batch_size).enumerate() {
        try_with!(sender.send((i * batch_size, batch)), "could not queue work");
    }
    drop(sender);

    // Check if we will go ahead and bind threads:
    let (bind_threads, core_ids) = match core_affinity::get_core_ids() {
        Some(ids) => {
            // If there are fewer cores than threads demanded, than don't bother binding threads:
            if ids.len() < param.num_threads as usize {
                (false, Vec::new())
            } else {
                (true, ids)
            }
        }
        _ => (false, Vec::new()),
    };
    let core_ids_ref = &core_ids;
    let receiver_ref = &receiver;
    let f_ref = &f;

    // Panics on the calling thread are caught as well so they turn into the same error:
    let run_main = || panic::catch_unwind(AssertUnwindSafe(|| run_batches(0, receiver_ref, f_ref)));

    if param.num_threads <= 1 {
        if run_main().is_err() {
            bail!("The calling thread panicked while running a parallel loop.");
        }
        return Ok(());
    }

    // We subtract one because don't want to include the main thread:
    let num_threads = param.num_threads - 1;

    let result = thread::scope(|s| {
        for id in 1..=num_threads {
            s.spawn(move |_| {
                // Bind the threads as appropriate:
                if bind_threads {
                    core_affinity::set_for_current(core_ids_ref[id as usize]);
                }
                run_batches(id, receiver_ref, f_ref);
            });
        }

        // The "main" thread always has id 0:
        run_main()
    });

    match result {
        Ok(Ok(())) => Ok(()),
        _ => bail!("A thread panicked while running a parallel loop."),
    }
}

fn run_batches<T, F>(id: u32, receiver: &Receiver<(usize, &mut [T])>, f: &F)
where
    F: Fn(usize, &mut T),
{
    let mut count = 0;
    while let Ok((start, batch)) = receiver.recv() {
        for (i, item) in batch.iter_mut().enumerate() {
            f(start + i, item);
        }
        count += 1;
    }
    debug!("thread {} finished {} batches", id, count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_item_is_visited_once() {
        for &num_threads in [1, 2, 5].iter() {
            let mut items = vec![0usize; 103];
            let param = ThreadParam {
                num_threads,
                batch_size: 4,
            };
            parallel_for(&mut items, param, |i, item| *item += i + 1).unwrap();
            for (i, item) in items.iter().enumerate() {
                assert_eq!(*item, i + 1);
            }
        }
    }

    #[test]
    fn empty_input_is_fine() {
        let mut items: Vec<u32> = Vec::new();
        let param = ThreadParam {
            num_threads: 3,
            batch_size: 0,
        };
        parallel_for(&mut items, param, |_, _| unreachable!()).unwrap();
    }

    #[test]
    fn panic_is_an_error() {
        let mut items = vec![0u32; 8];
        let param = ThreadParam {
            num_threads: 2,
            batch_size: 1,
        };
        let result = parallel_for(&mut items, param, |i, _| {
            if i == 5 {
                panic!("boom");
            }
        });
        assert!(result.is_err());
    }
}
