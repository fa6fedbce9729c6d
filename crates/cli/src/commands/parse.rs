//! `redtalon parse` — Compress a raw request offline.
//!
//! Pure compressor run: no store, no network, no config. Useful for
//! checking what an analysis would actually see before spending a project
//! on it.

use redtalon_compressor::{compress_for_context, parse};

pub fn run(input: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let raw = super::read_input(input)?;
    let parsed = parse(&raw);
    let digest = compress_for_context(&parsed);

    if json {
        let out = serde_json::json!({
            "request": parsed,
            "digest": digest,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("🗜️  Parsed Request");
    println!("─────────────────────────────────────");
    println!("  Hash:     {}", super::short_hash(&parsed.hash));
    println!("  Method:   {}", parsed.method);
    println!("  Endpoint: {}", parsed.endpoint);
    if let Some(domain) = &parsed.domain {
        println!("  Domain:   {domain}");
    }
    println!("  Category: {}", parsed.category);
    println!(
        "  Size:     {} → {} bytes ({:.0}% reduction)",
        parsed.original_size,
        parsed.compressed_size,
        parsed.compression_ratio * 100.0
    );
    if !parsed.patterns.is_empty() {
        println!("  Patterns: {}", parsed.patterns.join(", "));
    }
    if !parsed.attack_vectors.is_empty() {
        println!("  Vectors:  {}", parsed.attack_vectors.join(", "));
    }

    println!();
    println!("Digest:");
    for line in digest.lines() {
        println!("  {line}");
    }

    Ok(())
}
