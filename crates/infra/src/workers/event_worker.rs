use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use procura_core::TenantId;
use procura_events::{EventBus, Subscription, TenantScoped};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic bus-consuming worker loop.
///
/// - Subscribes to an event bus before returning, so nothing published
///   after `spawn` is missed
/// - Runs the handler for each message on its own thread
/// - Handler failures are logged and the message is dropped (no retries)
#[derive(Debug)]
pub struct EventWorker;

impl EventWorker {
    /// - `tenant_id`: when provided, messages for other tenants are ignored
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> std::io::Result<WorkerHandle>
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if tenant_id.is_some_and(|t| msg.tenant_id() != t) {
                    continue;
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "event worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use procura_events::InMemoryEventBus;

    #[derive(Debug, Clone)]
    struct Msg(TenantId, u32);

    impl TenantScoped for Msg {
        fn tenant_id(&self) -> TenantId {
            self.0
        }
    }

    fn wait_for(seen: &Mutex<Vec<u32>>, n: usize) {
        for _ in 0..100 {
            if seen.lock().unwrap().len() >= n {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn filters_by_tenant_and_survives_handler_errors() {
        let bus = InMemoryEventBus::<Msg>::new();
        let tenant = TenantId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let handle = EventWorker::spawn("test-worker", &bus, Some(tenant), move |msg: Msg| {
            sink.lock().unwrap().push(msg.1);
            if msg.1 == 1 { Err("boom") } else { Ok(()) }
        })
        .unwrap();

        bus.publish(Msg(tenant, 1)).unwrap();
        bus.publish(Msg(TenantId::new(), 2)).unwrap();
        bus.publish(Msg(tenant, 3)).unwrap();

        wait_for(&seen, 2);
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }
}
