use mt_detect_lib::api::preview_chapters;
use mt_detect_lib::models::Chapter;
use serde::Serialize;

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin segment_book -- <book.txt> [--chapters <n>] [--out <json_path>]\n\nPrints the chapters the segmenter finds without writing chapter files."
        );
        return Ok(());
    }

    let path = args[1].clone();
    let chapters_n: usize = parse_arg_value(&args, "--chapters")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);
    let out_path = parse_arg_value(&args, "--out");

    let chapters = preview_chapters(std::path::Path::new(&path)).map_err(|e| e.to_string())?;

    println!("File: {}", path);
    println!("Chapters: {}", chapters.len());
    for c in chapters.iter().take(chapters_n) {
        let words = c.text.split_whitespace().count();
        println!(
            "[C{:04}] lines=[{},{}) words={}  {}",
            c.number,
            c.start_line,
            c.end_line,
            words,
            preview(&c.text, 100)
        );
    }
    if chapters.len() > chapters_n {
        println!("... ({} more chapters)", chapters.len() - chapters_n);
    }

    if let Some(out_path) = out_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output {
            file: String,
            chapter_count: usize,
            chapters: Vec<Chapter>,
        }

        let out = Output {
            file: path.clone(),
            chapter_count: chapters.len(),
            chapters,
        };

        let json = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json).map_err(|e| format!("write out failed: {}", e))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
