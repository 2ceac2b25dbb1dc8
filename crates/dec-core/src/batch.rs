use std::collections::BTreeMap;
use std::io;
use std::sync::{mpsc, Mutex};
use std::thread;

use tracing::debug;

/// Releases results in index order, buffering the ones that arrive early.
#[derive(Debug)]
pub struct Sequencer<O> {
    next: usize,
    pending: BTreeMap<usize, O>,
}

impl<O> Default for Sequencer<O> {
    fn default() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<O> Sequencer<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next result to be emitted.
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Results waiting for an earlier index.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Accept one result and emit every result now contiguous with the
    /// already-emitted prefix.
    pub fn push<E>(&mut self, index: usize, output: O, emit: &mut E)
    where
        E: FnMut(usize, O),
    {
        if index != self.next {
            self.pending.insert(index, output);
            return;
        }
        emit(index, output);
        self.next += 1;
        while let Some(out) = self.pending.remove(&self.next) {
            emit(self.next, out);
            self.next += 1;
        }
    }
}

fn worker_loop<T, O, W>(
    jobs: &Mutex<mpsc::Receiver<(usize, T)>>,
    results: mpsc::Sender<(usize, O)>,
    work: &W,
) where
    W: Fn(usize, T) -> O,
{
    loop {
        let job = {
            let Ok(rx) = jobs.lock() else { return };
            rx.recv()
        };
        let Ok((index, item)) = job else { return };
        if results.send((index, work(index, item))).is_err() {
            return;
        }
    }
}

/// Run `work` over `inputs` on a pool of `threads` named workers and hand
/// every result to `emit` in input order. Returns the number emitted.
///
/// `work` never sees a shared error state: a failure for one input is just
/// that input's output value.
pub fn run_ordered<I, T, O, W, E>(
    inputs: I,
    threads: usize,
    work: W,
    mut emit: E,
) -> io::Result<usize>
where
    I: IntoIterator<Item = T>,
    T: Send,
    O: Send,
    W: Fn(usize, T) -> O + Sync,
    E: FnMut(usize, O),
{
    let threads = threads.max(1);
    let (job_tx, job_rx) = mpsc::channel::<(usize, T)>();
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel::<(usize, O)>();
    debug!(threads, "batch started");

    thread::scope(|s| {
        let job_tx = job_tx;
        for i in 0..threads {
            let jobs = &job_rx;
            let results = result_tx.clone();
            let work = &work;
            thread::Builder::new()
                .name(format!("dec-worker-{i}"))
                .spawn_scoped(s, move || worker_loop(jobs, results, work))?;
        }
        drop(result_tx);

        let mut submitted = 0;
        for (index, item) in inputs.into_iter().enumerate() {
            if job_tx.send((index, item)).is_err() {
                break;
            }
            submitted += 1;
        }
        drop(job_tx);

        let mut sequencer = Sequencer::new();
        for (index, output) in result_rx {
            sequencer.push(index, output, &mut emit);
        }
        debug!(submitted, emitted = sequencer.next_index(), "batch finished");
        Ok(sequencer.next_index())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sequencer_buffers_out_of_order() {
        let mut seq = Sequencer::new();
        let mut out = Vec::new();
        let mut emit = |i: usize, s: &str| out.push((i, s.to_string()));
        seq.push(2, "c", &mut emit);
        seq.push(1, "b", &mut emit);
        assert_eq!(seq.pending(), 2);
        seq.push(0, "a", &mut emit);
        assert_eq!(seq.pending(), 0);
        assert_eq!(seq.next_index(), 3);
        assert_eq!(
            out,
            vec![(0, "a".into()), (1, "b".into()), (2, "c".into())]
        );
    }

    #[test]
    fn results_come_back_in_input_order() {
        let inputs: Vec<u64> = (0..40).collect();
        let mut got = Vec::new();
        let n = run_ordered(
            inputs,
            4,
            |_, x| {
                // later inputs finish first
                thread::sleep(Duration::from_micros((40 - x) * 50));
                x * 2
            },
            |i, y| got.push((i, y)),
        )
        .unwrap();
        assert_eq!(n, 40);
        let expected: Vec<_> = (0..40u64).map(|i| (i as usize, i * 2)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn errors_stay_per_item() {
        let inputs = vec!["1", "x", "3"];
        let mut got = Vec::new();
        run_ordered(
            inputs,
            2,
            |_, s| s.parse::<i32>().map_err(|e| e.to_string()),
            |_, r| got.push(r.is_ok()),
        )
        .unwrap();
        assert_eq!(got, vec![true, false, true]);
    }

    #[test]
    fn empty_input_and_zero_threads() {
        let n = run_ordered(Vec::<u8>::new(), 0, |_, x| x, |_, _| {}).unwrap();
        assert_eq!(n, 0);
    }
}
