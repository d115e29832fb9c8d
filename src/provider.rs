use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::api::CalendarBackend;
use crate::query_cache::QueryKey;
use crate::state::{Delta, ProviderCommand};

/// Run backend calls off the UI thread. Each command becomes exactly one
/// [`Delta`]; the worker exits when the command channel closes.
pub fn spawn_provider(
    backend: Arc<dyn CalendarBackend>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    parallelism: usize,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let pool = build_fetch_pool(parallelism);
        for cmd in cmd_rx {
            let tx = tx.clone();
            let backend = backend.clone();
            let job = move || {
                let delta = run_command(backend.as_ref(), cmd);
                let _ = tx.send(delta);
            };
            if let Some(pool) = pool.as_ref() {
                pool.spawn(job);
            } else {
                thread::spawn(job);
            }
        }
        log::debug!("provider command channel closed");
    })
}

pub fn run_command(backend: &dyn CalendarBackend, cmd: ProviderCommand) -> Delta {
    match cmd {
        ProviderCommand::FetchEvents(filter) => match backend.list_events(&filter) {
            Ok(events) => {
                log::debug!(
                    "fetched {} events for {}..{}",
                    events.len(),
                    filter.from,
                    filter.to
                );
                Delta::EventsLoaded { filter, events }
            }
            Err(err) => Delta::FetchFailed {
                key: QueryKey::Events(filter),
                error: format!("{err:#}"),
            },
        },
        ProviderCommand::FetchUsers => match backend.list_users() {
            Ok(users) => Delta::UsersLoaded(users),
            Err(err) => Delta::FetchFailed {
                key: QueryKey::Users,
                error: format!("{err:#}"),
            },
        },
        ProviderCommand::UpdateEvent { id, patch } => match backend.update_event(&id, &patch) {
            Ok(event) => Delta::EventUpdated(event),
            Err(err) => Delta::EventUpdateFailed {
                id,
                error: format!("{err:#}"),
            },
        },
        ProviderCommand::CreateEvent(event) => match backend.create_event(&event) {
            Ok(event) => Delta::EventCreated(event),
            Err(err) => Delta::MutationFailed {
                action: "create event",
                error: format!("{err:#}"),
            },
        },
        ProviderCommand::DeleteEvent { id } => match backend.delete_event(&id) {
            Ok(()) => Delta::EventDeleted { id },
            Err(err) => Delta::MutationFailed {
                action: "delete event",
                error: format!("{err:#}"),
            },
        },
    }
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 16))
        .thread_name(|idx| format!("clubhouse-fetch-{idx}"))
        .build()
        .ok()
}
