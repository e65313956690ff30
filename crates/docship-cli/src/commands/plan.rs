//! Plan command: show what a run would execute without touching Docker.

use anyhow::Result;
use docship_pipeline::plan::{PlannedStep, build_plan, publish_plan};
use serde_json::json;

use super::{PipelineArgs, resolve};

/// Print the build and publish commands for the resolved settings.
pub fn plan(args: &PipelineArgs, as_json: bool) -> Result<()> {
    let resolved = resolve(args)?;
    resolved.config.validate()?;
    let build = build_plan(&resolved.config);
    let publish = publish_plan(&resolved.publish);

    if as_json {
        let doc = match &publish {
            Ok(publish) => json!({
                "source": resolved.source.path(),
                "build": build,
                "publish": publish,
            }),
            Err(e) => json!({
                "source": resolved.source.path(),
                "build": build,
                "publish": null,
                "publish_error": e.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Build ({} in {})", build.image, build.working_dir);
    print_steps(&build.steps);
    println!("  output: {}", build.output_path);
    println!();
    match publish {
        Ok(publish) => {
            println!("Publish ({} in {})", publish.image, publish.working_dir);
            print_steps(&publish.steps);
        }
        Err(e) => println!("Publish: not available ({})", e),
    }
    Ok(())
}

fn print_steps(steps: &[PlannedStep]) {
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, step.stage, step.command.join(" "));
    }
}
