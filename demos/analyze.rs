//! Runs the full pipeline on one image and prints the verdict.
//!
//! Run with: cargo run --example analyze -- <image_path> [ela_output.png]

use std::{env, process, sync::Arc};

use tamper_forensics::{ForensicsAnalyzer, progress::Stage, report::JsonReport};

fn main() {
    let args = env::args().collect::<Vec<_>>();

    let Some(image_path) = args.get(1) else {
        println!("Usage: {} <image_path> [ela_output.png]", args[0]);
        return;
    };

    let analyzer = ForensicsAnalyzer::new().with_progress(Arc::new(|stage: Stage, fraction: f64| {
        println!("  [{:>3.0}%] {}", fraction * 100.0, stage.name());
    }));

    println!("Analyzing {}", image_path);
    let verdict = match analyzer.analyze(image_path) {
        Ok(verdict) => verdict,
        Err(err) => {
            eprintln!("{} ({})", err.user_message(), err);
            process::exit(1);
        }
    };

    println!();
    println!("Result:     {}", verdict.result_type);
    println!("Confidence: {:.1}% ({:?})", verdict.confidence, verdict.confidence_level);

    let evidence = &verdict.technical_data;
    println!(
        "ELA:        mean {:.3}, std {:.3}",
        evidence.ela.mean_difference, evidence.ela.std_deviation
    );
    println!(
        "Copy-move:  {} matches, {} inliers",
        evidence.copy_move.match_count, evidence.copy_move.inlier_count
    );
    println!("Splicing:   noise ratio {:.3}", evidence.splicing.noise_diff);
    println!("Time:       {:.3}s", evidence.processing_time);

    if let Some(output) = args.get(2) {
        match evidence.ela.save(output) {
            Ok(()) => println!("ELA image written to {}", output),
            Err(err) => eprintln!("{}", err),
        }
    }

    match JsonReport::from(&verdict).to_json() {
        Ok(json) => println!("\n{}", json),
        Err(err) => eprintln!("cannot serialize report: {}", err),
    }
}
