use statlink_client::{Client, ClientError, EventSink};
use tracing::debug;

use crate::cmd::{RequestKind, Target};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat};

/// Connect, issue one payload-less request, and print its reply.
pub fn run(kind: RequestKind, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let timeout = target.timeout()?;
    let mut client = connect(target)?;
    debug!(?kind, "sending request");
    let reply = client
        .request(kind.type_tag(), timeout)
        .map_err(|err| client_error("request failed", err))?;
    print_reply(reply, &client.addr().to_string(), format);
    close(client);
    Ok(SUCCESS)
}

/// Connect, send `SET_DATA` with `text`, and print the server's answer.
pub fn run_set_data(text: &str, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let timeout = target.timeout()?;
    let mut client = connect(target)?;
    debug!(len = text.len(), "sending data");
    let reply = client
        .request_data(text, timeout)
        .map_err(|err| client_error("set-data failed", err))?;
    print_reply(reply, &client.addr().to_string(), format);
    close(client);
    Ok(SUCCESS)
}

pub fn connect(target: &Target) -> CliResult<Client> {
    let config = target.client_config()?;
    let addr = target.addr();
    let client = Client::connect(&addr, &config, &mut LifecycleLog)
        .map_err(|err| client_error("connect failed", err))?;
    Ok(client)
}

fn close(mut client: Client) {
    if let Err(err) = client.disconnect(&mut LifecycleLog) {
        debug!(error = %err, "shutdown after request failed");
    }
}

/// Routes lifecycle events to the log; replies are printed by the caller.
pub struct LifecycleLog;

impl EventSink for LifecycleLog {
    fn on_connected(&mut self) {
        debug!("connected");
    }

    fn on_connection_error(&mut self, error: &ClientError) {
        debug!(error = %error, "connection failed");
    }

    fn on_disconnected(&mut self) {
        debug!("disconnected");
    }
}
