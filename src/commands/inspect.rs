use crate::bundle::Bundle;
use crate::commands::{merge_sources, merge_stdin, Context, Outcome};
use crate::domain::models::InspectReport;
use crate::services::output::print_json;

pub fn handle_inspect(ctx: &Context, policies: &[String]) -> anyhow::Result<Outcome> {
    let mut bundle = Bundle::new();
    merge_stdin(ctx, &mut bundle)?;
    merge_sources(ctx, policies, &mut bundle)?;

    let report = InspectReport {
        templates: bundle.templates().iter().map(|t| t.resource_key()).collect(),
        constraints: bundle.constraints().iter().map(|c| c.resource_key()).collect(),
        duplicates: bundle.duplicate_keys(),
    };

    if ctx.json {
        print_json(true, report)?;
    } else {
        for key in &report.templates {
            println!("template\t{}", key);
        }
        for key in &report.constraints {
            println!("constraint\t{}", key);
        }
        for key in &report.duplicates {
            println!("duplicate\t{}", key);
        }
    }
    Ok(Outcome::Success)
}
