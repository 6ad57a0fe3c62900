use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{Environment, Error, ErrorKind, context, syntax::SyntaxConfig};
use rust_embed::RustEmbed;

use crate::errors::{MorphError, Result};
use crate::settings::MorphSettings;

/// Name of the morph material template.
pub const MORPH_TEMPLATE: &str = "morph";

static SHADER_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/render/shaders"]
struct ShaderAssets;

fn environment() -> Result<&'static Environment<'static>> {
    if let Some(env) = SHADER_ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();

    // `{$ if x $}` blocks and `$$ if x` line statements keep the templates
    // readable as plain WGSL.
    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .line_statement_prefix("$$")
        .build()?;

    env.set_syntax(syntax);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.set_loader(shader_loader);

    Ok(SHADER_ENV.get_or_init(|| env))
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if name.ends_with(".wgsl") {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    let Some(file) = ShaderAssets::get(filename.as_ref()) else {
        return Ok(None);
    };
    match std::str::from_utf8(file.data.as_ref()) {
        Ok(source) => Ok(Some(source.to_string())),
        Err(e) => Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!("{filename} is not valid UTF-8: {e}"),
        )),
    }
}

/// Renders the morph material WGSL for the given settings.
pub fn generate_morph_shader(settings: &MorphSettings) -> Result<String> {
    settings.validate()?;

    let env = environment()?;
    let template = env.get_template(MORPH_TEMPLATE).map_err(|e| {
        if e.kind() == ErrorKind::TemplateNotFound {
            MorphError::ShaderNotFound(MORPH_TEMPLATE.to_string())
        } else {
            MorphError::ShaderTemplate(e)
        }
    })?;

    let source = template.render(context! {
        weight_capacity => settings.weight_capacity,
        weight_vec4_count => settings.weight_vec4_count(),
        pack_normals => settings.pack_normals,
    })?;

    log::debug!(
        "Generated morph shader (capacity {}, normals {})",
        settings.weight_capacity,
        settings.pack_normals
    );
    Ok(source)
}
