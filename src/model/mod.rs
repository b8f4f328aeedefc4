use serde::Serialize;
use thiserror::Error;


/// Maximum context length of every llama context, in tokens.
pub const CONTEXT_LENGTH: u32 = 4096;


/// Fixed sampling configuration for every completion. Not request-configurable.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingParams {
pub max_tokens: i32,
pub temp: f32,
pub top_p: f32,
pub top_k: i32,
pub repeat_penalty: f32,
pub stop: Vec<String>,
}


impl Default for SamplingParams {
fn default() -> Self {
Self {
max_tokens: 200,
temp: 0.2,
top_p: 0.85,
top_k: 300,
repeat_penalty: 2.0,
stop: vec!["\nUser:".to_string(), "User:".to_string()],
}
}
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
Stop,
Length,
}


#[derive(Clone, Debug, Serialize)]
pub struct Choice {
pub text: String,
pub finish_reason: FinishReason,
}


/// Raw engine output. Only the first choice is ever used by the handler.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Completion {
pub choices: Vec<Choice>,
}


#[derive(Debug, Error)]
pub enum ModelError {
/// The engine failed while running (context setup, tokenisation, decode).
#[error("llama runtime failure: {0}")]
Runtime(String),
/// Anything else: unusable input, a crashed worker.
#[error("completion failed: {0}")]
Invalid(String),
}


#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync + 'static {
async fn complete(&self, prompt: String, params: &SamplingParams) -> Result<Completion, ModelError>;
}


/// Half of the available processors, never less than one.
pub fn default_thread_count() -> i32 {
thread_count_for(num_cpus::get())
}


fn thread_count_for(cpus: usize) -> i32 {
(cpus / 2).max(1) as i32
}


/// Cuts `text` at the earliest occurrence of any stop sequence.
/// Returns true when a stop sequence was found.
pub fn truncate_at_stop(text: &mut String, stop: &[String]) -> bool {
let cut = stop
.iter()
.filter(|s| !s.is_empty())
.filter_map(|s| text.find(s.as_str()))
.min();
match cut {
Some(idx) => {
text.truncate(idx);
true
}
None => false,
}
}


/// Drains bytes the streaming decoder still holds (a token that ended mid
/// character) into `out`, then applies the stop cut to the result.
pub fn flush_decoder(decoder: &mut encoding_rs::Decoder, out: &mut String, stop: &[String]) {
let cap = decoder.max_utf8_buffer_length(0).unwrap_or(0).max(8);
let mut tail = String::with_capacity(cap);
let _ = decoder.decode_to_string(&[], &mut tail, true);
out.push_str(&tail);
truncate_at_stop(out, stop);
}


pub mod llama;
