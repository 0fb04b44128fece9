mod clock;
mod control_loop;
mod gpio;
mod host;
mod publisher;
mod shutdown;

use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    host::run().await
}
