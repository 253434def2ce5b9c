use celebration_db::json_import::ImportScript;
use celebration_db::MigrationReport;

pub fn print_migration(report: &MigrationReport) {
    let mode = if report.applied { "" } else { " (no changes)" };
    println!("Schema Migration Report{mode}");
    println!("───────────────────────");
    println!("  Table:       {}", report.table);
    if report.added.is_empty() {
        println!("  Added:       (none)");
    } else {
        println!("  Added:       {}", report.added.join(", "));
    }
    println!("  Backfilled:  {} row(s)", report.backfilled_rows);
    println!("  Columns:     {}", report.final_columns.join(", "));
    if !report.failed.is_empty() {
        println!("  Errors ({}):", report.failed.len());
        for failure in &report.failed {
            println!("    - {}: {}", failure.column, failure.error);
        }
    }
}

pub fn print_import(script: &ImportScript) {
    println!("JSON Import");
    println!("───────────");
    println!("  Messages:    {}", script.messages);
    println!("  Memories:    {}", script.memories);
    if !script.errors.is_empty() {
        println!("  Errors ({}):", script.errors.len());
        for e in &script.errors {
            println!("    - {e}");
        }
    }
}
