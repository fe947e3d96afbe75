//! Eval command - evaluate source given on the command line.

use anyhow::Result;
use clap::Args;
use qjsw_runtime::{Context, JsValue};

use super::create_context;
use crate::config::Config;

#[derive(Args)]
pub struct EvalCommand {
    /// Source to evaluate
    pub source: String,

    /// Print the result
    #[arg(short, long)]
    pub print: bool,
}

impl EvalCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let context = create_context(config)?;
        let output = self.eval_in(&context)?;
        if self.print {
            println!("{output}");
        }
        context.destroy()?;
        Ok(())
    }

    /// Evaluate and describe the result
    pub fn eval_in(&self, context: &Context) -> Result<String> {
        let value = context.evaluate(&self.source)?;
        let output = describe(&value);
        value.release()?;
        output
    }
}

/// Printable form of an evaluation result
pub fn describe(value: &JsValue) -> Result<String> {
    Ok(match value {
        JsValue::Undefined => "undefined".to_string(),
        JsValue::Null => "null".to_string(),
        JsValue::Bool(b) => b.to_string(),
        JsValue::Int(i) => i.to_string(),
        JsValue::Long(l) => l.to_string(),
        JsValue::Double(d) if d.is_infinite() => {
            let sign = if d.is_sign_negative() { "-" } else { "" };
            format!("{sign}Infinity")
        }
        JsValue::Double(d) => d.to_string(),
        JsValue::String(s) => s.clone(),
        JsValue::Bytes(bytes) => format!("ArrayBuffer {{ byteLength: {} }}", bytes.len()),
        JsValue::Object(object) => match object.stringify()? {
            Some(json) => json,
            None => object.to_script_string()?,
        },
        JsValue::Array(array) => match array.stringify()? {
            Some(json) => json,
            None => array.to_script_string()?,
        },
        JsValue::Function(function) => function.to_script_string()?,
        JsValue::Callback(callback) => format!("[Function: {}]", callback.name()),
    })
}
