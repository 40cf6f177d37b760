//! Apply command implementation

use anyhow::Result;
use dbtc_core::{plan, Executor, SimulatedRemote};
use std::sync::Arc;

use crate::cli::{ApplyArgs, GlobalArgs, OutputFormat};
use crate::commands::common;
use crate::commands::plan::print_plan;

/// Execute the apply command
pub async fn execute(args: &ApplyArgs, global: &GlobalArgs) -> Result<()> {
    let graph = common::build_graph(global)?;
    let state = common::load_state(global)?;
    let plan = plan(&graph, &state)?;

    if plan.is_empty() {
        if args.output == OutputFormat::Text {
            println!("No changes. Resources match the configuration.");
        }
        return Ok(());
    }
    if args.output == OutputFormat::Text {
        print_plan(&plan, &state, OutputFormat::Text)?;
        println!();
    }

    let remote = Arc::new(SimulatedRemote::from_state(&state));
    let result = Executor::new(remote, state)
        .with_state_path(&global.state)
        .with_cancel_flag(common::cancel_on_ctrl_c())
        .apply(&plan)
        .await;

    common::finish_run(result, global, args.output)
}
