use super::{
    flush_decoder, truncate_at_stop, Choice, Completion, FinishReason, LlmBackend, ModelError, SamplingParams,
};
use anyhow::Result;
use std::path::PathBuf;

// Stand-in used when the crate is built without llama.cpp. Loading always fails,
// so the server refuses to start instead of answering every request with an error.
#[cfg(not(feature = "llama"))]
#[derive(Clone)]
pub struct LlamaBackend;

#[cfg(not(feature = "llama"))]
impl LlamaBackend {
    pub fn new(model_path: PathBuf, _n_ctx: u32, _n_threads: i32, _n_gpu_layers: u32) -> Result<Self> {
        anyhow::bail!(
            "cannot load {}: built without the `llama` feature",
            model_path.display()
        )
    }
}

#[cfg(not(feature = "llama"))]
#[async_trait::async_trait]
impl LlmBackend for LlamaBackend {
    async fn complete(&self, _prompt: String, _p: &SamplingParams) -> Result<Completion, ModelError> {
        Err(ModelError::Runtime("llama backend not compiled in".into()))
    }
}

// Real llama.cpp backend using `llama-cpp-2` (enabled with feature `llama`).
#[cfg(feature = "llama")]
mod real_backend {
    use super::*;
    use anyhow::{ensure, Context};
    use llama_cpp_2::context::params::LlamaContextParams;
    use llama_cpp_2::llama_backend::LlamaBackend as LLBackend;
    use llama_cpp_2::llama_batch::LlamaBatch;
    use llama_cpp_2::model::params::LlamaModelParams;
    use llama_cpp_2::model::{AddBos, LlamaModel, Special};
    use llama_cpp_2::sampling::LlamaSampler;
    use llama_cpp_2::{ggml_time_us, send_logs_to_tracing, LogOptions};
    use std::fmt::Display;
    use std::num::NonZeroU32;
    use std::sync::Arc;
    use std::time::Duration;

    // llama.cpp treats this seed as "pick one at random".
    const RANDOM_SEED: u32 = 0xFFFF_FFFF;
    const PENALTY_LAST_N: i32 = 64;

    pub struct Inner {
        backend: LLBackend,
        model: LlamaModel,
        n_ctx: u32,
        n_threads: i32,
    }

    /// Loaded weights plus the thread configuration, shared read-only by all requests.
    #[derive(Clone)]
    pub struct LlamaBackend {
        inner: Arc<Inner>,
    }

    fn runtime<E: Display>(what: &'static str) -> impl FnOnce(E) -> ModelError {
        move |e| ModelError::Runtime(format!("{what}: {e}"))
    }

    impl LlamaBackend {
        pub fn new(model_path: PathBuf, n_ctx: u32, n_threads: i32, n_gpu_layers: u32) -> Result<Self> {
            // route llama.cpp logs to tracing so they appear in server logs when RUST_LOG is set
            send_logs_to_tracing(LogOptions::default());

            ensure!(model_path.is_file(), "model file not found: {}", model_path.display());
            ensure!(n_ctx > 0, "context length must be positive");

            let backend = LLBackend::init().context("init llama backend")?;

            let mut model_params = LlamaModelParams::default();
            if n_gpu_layers > 0 {
                model_params = model_params.with_n_gpu_layers(n_gpu_layers);
            }

            let model = LlamaModel::load_from_file(&backend, &model_path, &model_params)
                .with_context(|| format!("load GGUF model {}", model_path.display()))?;

            tracing::info!(path = %model_path.display(), n_ctx, n_threads, n_gpu_layers, "model loaded");

            Ok(Self {
                inner: Arc::new(Inner { backend, model, n_ctx, n_threads: n_threads.max(1) }),
            })
        }
    }

    fn generate(inner: &Inner, prompt: &str, p: &SamplingParams) -> Result<Completion, ModelError> {
        // Fresh context per request: no KV state leaks between callers.
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(inner.n_ctx))
            .with_n_batch(inner.n_ctx)
            .with_n_threads(inner.n_threads)
            .with_n_threads_batch(inner.n_threads);

        let mut ctx = inner
            .model
            .new_context(&inner.backend, ctx_params)
            .map_err(runtime("create llama context"))?;

        let tokens_list = inner
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(runtime("tokenize prompt"))?;
        if tokens_list.is_empty() {
            return Err(ModelError::Invalid("prompt produced no tokens".into()));
        }

        let n_ctx = ctx.n_ctx() as i32;
        let n_prompt = tokens_list.len() as i32;
        let max_new = p.max_tokens.min(n_ctx - n_prompt);
        if max_new <= 0 {
            return Err(ModelError::Invalid(format!(
                "prompt of {n_prompt} tokens exceeds context window of {n_ctx}"
            )));
        }

        let mut batch = LlamaBatch::new(tokens_list.len().max(512), 1);
        let last_index = n_prompt - 1;
        for (i, token) in (0_i32..).zip(tokens_list.into_iter()) {
            batch
                .add(token, i, &[0], i == last_index)
                .map_err(runtime("fill prompt batch"))?;
        }
        ctx.decode(&mut batch).map_err(runtime("decode prompt"))?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(PENALTY_LAST_N, p.repeat_penalty, 0.0, 0.0),
            LlamaSampler::top_k(p.top_k),
            LlamaSampler::top_p(p.top_p, 1),
            LlamaSampler::temp(p.temp),
            LlamaSampler::dist(RANDOM_SEED),
        ]);

        let mut n_cur = batch.n_tokens();
        let mut n_decode = 0;
        let t_main_start = ggml_time_us();

        let mut out = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut finish_reason = FinishReason::Length;
        let mut cut_at_stop = false;

        while n_decode < max_new {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if inner.model.is_eog_token(token) {
                finish_reason = FinishReason::Stop;
                break;
            }

            let output_bytes = inner
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(runtime("detokenize"))?;
            let cap = decoder.max_utf8_buffer_length(output_bytes.len()).unwrap_or(32);
            let mut piece = String::with_capacity(cap);
            let _ = decoder.decode_to_string(&output_bytes, &mut piece, false);
            out.push_str(&piece);
            n_decode += 1;

            if truncate_at_stop(&mut out, &p.stop) {
                finish_reason = FinishReason::Stop;
                cut_at_stop = true;
                break;
            }

            batch.clear();
            batch.add(token, n_cur, &[0], true).map_err(runtime("fill step batch"))?;
            n_cur += 1;
            ctx.decode(&mut batch).map_err(runtime("decode step"))?;
        }

        // After a stop-sequence cut, pending bytes lie past the cut and are dropped.
        if !cut_at_stop {
            flush_decoder(&mut decoder, &mut out, &p.stop);
        }

        let duration = Duration::from_micros((ggml_time_us() - t_main_start).max(0) as u64);
        tracing::debug!(n_prompt, n_decode, ?duration, ?finish_reason, "generation finished");

        Ok(Completion { choices: vec![Choice { text: out, finish_reason }] })
    }

    #[async_trait::async_trait]
    impl LlmBackend for LlamaBackend {
        async fn complete(&self, prompt: String, p: &SamplingParams) -> Result<Completion, ModelError> {
            let inner = self.inner.clone();
            let params = p.clone();
            // llama.cpp blocks for the whole generation; keep it off the async workers.
            tokio::task::spawn_blocking(move || generate(&inner, &prompt, &params))
                .await
                .map_err(|e| ModelError::Invalid(format!("generation task failed: {e}")))?
        }
    }

    pub use LlamaBackend as RealLlamaBackend;
}

#[cfg(feature = "llama")]
pub use real_backend::RealLlamaBackend as LlamaBackend;
