//! Destroy command implementation

use anyhow::Result;
use dbtc_core::{plan_destroy, Executor, SimulatedRemote};
use std::sync::Arc;

use crate::cli::{DestroyArgs, GlobalArgs, OutputFormat};
use crate::commands::common;
use crate::commands::plan::print_plan;

/// Execute the destroy command
pub async fn execute(args: &DestroyArgs, global: &GlobalArgs) -> Result<()> {
    let state = common::load_state(global)?;
    if state.is_empty() {
        if args.output == OutputFormat::Text {
            println!("Nothing to destroy: {} is empty.", global.state.display());
        }
        return Ok(());
    }

    if args.output == OutputFormat::Text {
        print_plan(&plan_destroy(&state)?, &state, OutputFormat::Text)?;
        println!();
    }

    let remote = Arc::new(SimulatedRemote::from_state(&state));
    let result = Executor::new(remote, state)
        .with_state_path(&global.state)
        .with_cancel_flag(common::cancel_on_ctrl_c())
        .destroy()
        .await;

    common::finish_run(result, global, args.output)
}
