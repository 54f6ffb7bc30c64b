//! Built-in demo: extracting a candidate profile from a CV.
//!
//! Three slots are crossed: prompt template, model and parser. Model calls
//! are simulated with per-model latency, error behaviour and catalog pricing,
//! so the benchmark runs offline.

use rand::Rng;
use serde_json::{Value, json};
use std::time::Duration;
use undetermini_core::pricing::{COHERE_GENERATE, GPT_3_5_TURBO_1106, GPT_4_1106_PREVIEW};
use undetermini_core::{
    ConfigError, ExecutionError, ImplementationFactory, Method, MethodValue, ModelCatalog,
    RunContext,
};

pub const CV_TEXT: &str = "Nicolas Rotier, 32 years old. Software Engineer with ten years \
    of experience building data pipelines and web services in Nantes.";

pub fn input() -> Value {
    json!({ "cv": CV_TEXT })
}

pub fn expected_output() -> Value {
    json!({
        "firstname": "Nicolas",
        "lastname": "Rotier",
        "age": 32,
        "profession": "Software Engineer"
    })
}

/// Simulated behaviour of one model.
struct ModelProfile {
    base_latency_ms: u64,
    /// Chance of misreading a field.
    slip_rate: f64,
    /// Chance of wrapping the JSON in prose.
    chatter_rate: f64,
}

fn profile(model: &str) -> ModelProfile {
    match model {
        GPT_4_1106_PREVIEW => ModelProfile {
            base_latency_ms: 120,
            slip_rate: 0.05,
            chatter_rate: 0.1,
        },
        GPT_3_5_TURBO_1106 => ModelProfile {
            base_latency_ms: 40,
            slip_rate: 0.2,
            chatter_rate: 0.3,
        },
        _ => ModelProfile {
            base_latency_ms: 60,
            slip_rate: 0.35,
            chatter_rate: 0.5,
        },
    }
}

/// Rough token count; real tokenisers are out of scope for the demo.
fn approx_tokens(text: &str) -> u64 {
    (text.split_whitespace().count() as u64 * 4).div_ceil(3)
}

/// Draw the simulated completion and latency up front so no RNG is held
/// across an await.
fn simulate_completion(model: &str, careful: bool) -> (String, Duration) {
    let profile = profile(model);
    let mut rng = rand::thread_rng();
    let slip_rate = if careful {
        profile.slip_rate / 2.0
    } else {
        profile.slip_rate
    };

    let mut answer = expected_output();
    if rng.gen_bool(slip_rate) {
        answer["age"] = json!(33);
    }
    if rng.gen_bool(slip_rate / 2.0) {
        answer["profession"] = json!("Data Engineer");
    }

    let body = answer.to_string();
    let raw = if rng.gen_bool(profile.chatter_rate) {
        format!("Sure! Here is the extracted profile:\n{body}\nLet me know if you need more.")
    } else {
        body
    };
    let jitter = rng.gen_range(0..=profile.base_latency_ms / 2);
    (raw, Duration::from_millis(profile.base_latency_ms + jitter))
}

fn strict_parse(raw: &Value) -> Result<Value, ExecutionError> {
    let text = raw.as_str().unwrap_or_default();
    Ok(serde_json::from_str(text)?)
}

fn lenient_parse(raw: &Value) -> Result<Value, ExecutionError> {
    let text = raw.as_str().unwrap_or_default();
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&text[start..=end])?),
        _ => Err(ExecutionError::new("no JSON object in model output")),
    }
}

async fn extract(input: Value, ctx: RunContext) -> Result<Value, ExecutionError> {
    let template = ctx.methods().constant("promptTemplate")?;
    let model = ctx
        .methods()
        .constant("model")?
        .as_str()
        .ok_or_else(|| ExecutionError::new("model slot must be a string"))?
        .to_string();
    let cv = input["cv"].as_str().unwrap_or_default();
    let prompt = template.as_str().unwrap_or_default().replace("{cv}", cv);

    let careful = prompt.contains("exactly");
    let (raw, latency) = simulate_completion(&model, careful);
    tokio::time::sleep(latency).await;

    let cost = ModelCatalog::default()
        .cost_of_tokens(&model, approx_tokens(&prompt), approx_tokens(&raw))
        .map_err(ExecutionError::from_display)?;
    ctx.add_cost(cost);

    ctx.methods().call("parser", &Value::String(raw))
}

/// The demo factory: 2 templates × 3 models × 2 parsers.
pub fn factory() -> Result<ImplementationFactory, ConfigError> {
    let mut factory =
        ImplementationFactory::from_fn("demo-extract-v1", extract).with_resource_slot("model");

    let templates = [
        ("short-prompt", "Extract firstname, lastname, age and profession as JSON: {cv}"),
        (
            "careful-prompt",
            "Read the CV below and return exactly one JSON object with the keys firstname, \
             lastname, age (number) and profession. CV: {cv}",
        ),
    ];
    for (name, text) in templates {
        factory.add_method(Method::new("promptTemplate", name, MethodValue::constant(text)))?;
    }
    for model in [GPT_4_1106_PREVIEW, GPT_3_5_TURBO_1106, COHERE_GENERATE] {
        factory.add_method(Method::new("model", model, MethodValue::constant(model)))?;
    }
    factory.add_method(Method::new(
        "parser",
        "strict-json",
        MethodValue::function("strict-json-v1", strict_parse),
    ))?;
    factory.add_method(Method::new(
        "parser",
        "lenient-json",
        MethodValue::function("lenient-json-v1", lenient_parse),
    ))?;
    Ok(factory)
}
