//! Usage receipt printed after a successful install

use std::fmt::Write;

use crate::registry::{PackageDescriptor, PackageKind};
use crate::render::RenderContext;

/// Human-readable wiring instructions for an installed package
pub fn usage_text(descriptor: &PackageDescriptor, ctx: &RenderContext) -> String {
    let mut out = String::new();
    let import = format!("import {} \"{}/{}\"", ctx.package, ctx.module, ctx.package_path);

    match descriptor.kind {
        PackageKind::LibraryModule => {
            let _ = writeln!(out, "Import the package:");
            let _ = writeln!(out, "   {import}");
            let _ = writeln!(out);
            let _ = writeln!(out, "Wire into the Fx application:");
            let _ = writeln!(out, "   app := fx.New(");
            let _ = writeln!(out, "       {}.Module,", ctx.package);
            let _ = writeln!(out, "       // ... other modules");
            let _ = writeln!(out, "   )");

            if !descriptor.dependencies.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "Dependencies to add:");
                for dep in &descriptor.dependencies {
                    let _ = writeln!(out, "   go get {dep}");
                }
            }
        }
        PackageKind::CliCommand => {
            let _ = writeln!(out, "Run as a command:");
            let _ = writeln!(out, "   vpkg exec {} [args]", ctx.vpkg_name);
            let _ = writeln!(out);
            let _ = writeln!(out, "Or embed in your application:");
            let _ = writeln!(out, "   {import}");
            let _ = writeln!(out, "   // {}.Command() returns the command", ctx.package);
        }
    }

    let _ = writeln!(out);
    let _ = write!(out, "See the README in {} for details.", ctx.package_path);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext {
        RenderContext {
            module: "example.com/app".to_string(),
            vpkg_name: "acme/redis-cache".to_string(),
            namespace: "acme".to_string(),
            pkg: "redis-cache".to_string(),
            package: "rediscache".to_string(),
            package_path: "vpkg/acme/redis-cache".to_string(),
            version: "1.0.0".to_string(),
            author: String::new(),
            time: String::new(),
            title: String::new(),
            description: String::new(),
        }
    }

    fn descriptor(kind: &str, deps: &str) -> PackageDescriptor {
        serde_yaml_ng::from_str(&format!(
            "name: acme/redis-cache\ntype: {kind}\ntemplates: t\ndependencies: {deps}\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_library_receipt() {
        let text = usage_text(
            &descriptor("library-module", "[github.com/redis/go-redis/v9]"),
            &ctx(),
        );
        assert!(text.contains("import rediscache \"example.com/app/vpkg/acme/redis-cache\""));
        assert!(text.contains("rediscache.Module,"));
        assert!(text.contains("go get github.com/redis/go-redis/v9"));
        assert!(text.ends_with("See the README in vpkg/acme/redis-cache for details."));
    }

    #[test]
    fn test_cli_receipt() {
        let text = usage_text(&descriptor("cli-command", "[]"), &ctx());
        assert!(text.contains("vpkg exec acme/redis-cache [args]"));
        assert!(!text.contains("fx.New"));
        assert!(!text.contains("go get"));
    }
}
