pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod recurrence;
pub mod render;
pub mod selection;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use chrono::{
  Local,
  Utc
};
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting agenda CLI"
  );

  let mut cfg = config::Config::load(
    cli.agendarc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let mut store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut renderer =
    render::Renderer::new(&cfg)?;

  let now = Utc::now();
  let today = cfg
    .today(Local::now().date_naive())?;
  debug!(%today, "evaluation date pinned");

  let command =
    cli.command.unwrap_or_else(
      commands::default_command
    );

  commands::dispatch(
    &mut store,
    &cfg,
    &mut renderer,
    command,
    now,
    today
  )?;

  info!("done");
  Ok(())
}
