//! Template rendering
//!
//! Files whose names carry a template suffix are parsed and executed
//! against a [`RenderContext`]; everything else is copied byte for byte.

mod context;
mod funcs;
mod template;

pub use context::{detect_module, sanitized_identifier, RenderContext, VARIABLES};
pub use funcs::{
    to_camel_case, to_go_identifier, to_kebab_case, to_pascal_case, to_snake_case, to_title,
    FUNCTION_NAMES,
};
pub use template::{render_template, Template};

use crate::discovery::template_suffix;
use crate::error::Result;

/// Produce the installed bytes for one discovered file
///
/// `relative_path` is the path under the template root; it names the
/// file in render errors.
pub fn render_file(relative_path: &str, bytes: Vec<u8>, ctx: &RenderContext) -> Result<Vec<u8>> {
    if template_suffix(relative_path).is_none() {
        return Ok(bytes);
    }

    let source = String::from_utf8(bytes).map_err(|_| crate::error::VpkgError::Render {
        file: relative_path.to_string(),
        reason: "template is not valid UTF-8".to_string(),
    })?;
    Ok(render_template(relative_path, &source, ctx)?.into_bytes())
}
