use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use statlink_client::{Client, Event, Poll, TracingErrorSink};
use tracing::debug;

use crate::cmd::{parse_duration, RequestKind, Target, WatchArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: WatchArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let every = args.every.as_deref().map(parse_duration).transpose()?;
    let config = target.client_config()?;
    let addr = target.addr();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut events = Vec::<Event>::new();
    let connected = Client::connect(&addr, &config, &mut events);
    flush_events(&mut events, &addr, format);
    let mut client = connected.map_err(|err| client_error("connect failed", err))?;
    let server = client.addr().to_string();

    let mut tally = Tally::new(args.count);
    let mut next_send = Some(Instant::now());
    let mut errors = TracingErrorSink;

    while running.load(Ordering::SeqCst) {
        if next_send.is_some_and(|at| Instant::now() >= at) {
            send_all(&mut client, &args.request)?;
            next_send = every.map(|interval| Instant::now() + interval);
        }

        let poll = client
            .poll(&mut events, &mut errors)
            .map_err(|err| client_error("receive failed", err))?;
        for event in events.drain(..) {
            print_event(&event, &server, format);
            tally.record(&event);
        }

        if tally.done() {
            client
                .disconnect(&mut events)
                .map_err(|err| client_error("disconnect failed", err))?;
            flush_events(&mut events, &server, format);
            return Ok(SUCCESS);
        }

        if poll == Poll::Disconnected {
            return tally.finish_on_disconnect();
        }
    }

    debug!("interrupted");
    client
        .disconnect(&mut events)
        .map_err(|err| client_error("disconnect failed", err))?;
    flush_events(&mut events, &server, format);
    Ok(SUCCESS)
}

fn send_all(client: &mut Client, kinds: &[RequestKind]) -> CliResult<()> {
    for kind in kinds {
        client
            .send_request(kind.type_tag())
            .map_err(|err| client_error("send failed", err))?;
    }
    Ok(())
}

fn flush_events(events: &mut Vec<Event>, server: &str, format: OutputFormat) {
    for event in events.drain(..) {
        print_event(&event, server, format);
    }
}

/// Counts printed replies against an optional limit.
#[derive(Debug)]
struct Tally {
    seen: usize,
    limit: Option<usize>,
}

impl Tally {
    fn new(limit: Option<usize>) -> Self {
        Self { seen: 0, limit }
    }

    fn record(&mut self, event: &Event) {
        if event.is_reply() {
            self.seen = self.seen.saturating_add(1);
        }
    }

    fn done(&self) -> bool {
        self.limit.is_some_and(|limit| self.seen >= limit)
    }

    fn finish_on_disconnect(&self) -> CliResult<i32> {
        match self.limit {
            Some(limit) => Err(CliError::new(
                FAILURE,
                format!("server disconnected after {} of {limit} replies", self.seen),
            )),
            None => Ok(SUCCESS),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
