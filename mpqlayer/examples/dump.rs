//! Example: list and extract files from a base archive plus patches
//!
//! Patches are stacked in argument order, each above the previous one.
//! Run with `RUST_LOG=debug` to see archive and patch diagnostics.

use mpqlayer::{Archive, PatchChain};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() -> mpqlayer::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let mut archives = Vec::new();
    let mut mask = String::from("*");
    let mut extract = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mask" => mask = args.next().unwrap_or_else(|| usage()),
            "--extract" => extract = Some(args.next().unwrap_or_else(|| usage())),
            _ => archives.push(arg),
        }
    }
    if archives.is_empty() {
        usage();
    }

    let mut chain = PatchChain::new(Archive::open(&archives[0])?);
    for (i, path) in archives[1..].iter().enumerate() {
        chain.open_patch(path, 100 * (i as i32 + 1))?;
    }

    println!("Layers (highest priority first):");
    for layer in chain.chain_info() {
        println!(
            "  {:>5}  {}  ({:?}, {} files, {} bytes)",
            layer.priority, layer.name, layer.format_version, layer.file_count, layer.archive_size
        );
    }

    if let Some(name) = extract {
        let resolved = chain.resolve(&name)?;
        let target = Path::new(&name.replace('\\', "/"))
            .file_name()
            .map(|file| file.to_os_string())
            .unwrap_or_else(|| "extracted.bin".into());
        fs::write(&target, &resolved.data)?;
        println!(
            "Extracted {} ({} bytes, base from {}, {} patch(es) applied) to {}",
            name,
            resolved.data.len(),
            resolved.source_layer,
            resolved.patches_applied,
            target.to_string_lossy()
        );
        return Ok(());
    }

    let mut count = 0;
    for name in chain.enumerate(&mask)? {
        let info = chain.file_info(&name)?;
        println!("{:>10}  {}", info.file_size, name);
        count += 1;
    }
    println!("{count} file(s) match {mask}");

    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage: dump <base.MPQ> [patch.MPQ ...] [--mask <pattern>] [--extract <name>]");
    process::exit(1);
}
