//! Foreground supervision session.
//!
//! The supervisor runs on its runtime thread; this thread only waits for
//! Ctrl-C. Events are written to stdout as JSON lines by a printer thread.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use supervisor_core::{EventRecord, Supervisor, SupervisorRuntime};

pub enum Launch {
    Strategy(String),
    ResumeLast,
}

pub fn run(supervisor: Supervisor, launch: Launch) -> Result<(), String> {
    let auto_start_delay = supervisor.timings().auto_start_delay();

    let (event_tx, event_rx) = mpsc::channel::<EventRecord>();
    let printer = thread::spawn(move || {
        for record in event_rx {
            print_event(&record);
        }
    });

    let (interrupt_tx, interrupt_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })
    .map_err(|err| format!("Failed to install Ctrl-C handler: {err}"))?;

    let runtime = SupervisorRuntime::spawn(supervisor.with_event_sink(Box::new(event_tx)));

    // A session that fails before launching anything ends without the exit
    // stop, so a worker owned by another session survives a mistyped name.
    let interrupted = match launch {
        Launch::Strategy(name) => {
            if let Err(err) = runtime.start(&name) {
                runtime.dismiss();
                return Err(err.into());
            }
            false
        }
        Launch::ResumeLast => match interrupt_rx.recv_timeout(auto_start_delay) {
            Err(RecvTimeoutError::Timeout) => match runtime.resume_last_strategy() {
                Ok(true) => false,
                Ok(false) => {
                    tracing::info!("Nothing to resume; watching for a worker");
                    false
                }
                Err(err) => {
                    runtime.dismiss();
                    return Err(err.into());
                }
            },
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        },
    };

    if !interrupted {
        tracing::info!("Supervising; press Ctrl-C to exit");
        let _ = interrupt_rx.recv();
    }

    tracing::info!("Shutting down");
    match runtime.shutdown()? {
        Some(report) if !report.is_empty() => {
            tracing::info!(killed = report.killed, failed = report.failed, "Worker stopped on exit");
        }
        Some(_) => {}
        None => tracing::info!("Worker left running"),
    }

    if printer.join().is_err() {
        tracing::warn!("Event printer thread panicked");
    }
    Ok(())
}

fn print_event(record: &EventRecord) {
    match serde_json::to_string(record) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::warn!(error = %err, "Failed to serialize event"),
    }
}
