//! Integration test for real llama.cpp inference.
//! Requires MODEL_PATH env var pointing to a local GGUF, or a .gguf under ./models.

#[cfg(feature = "llama")]
#[tokio::test]
#[ignore = "needs a local GGUF model"]
async fn real_inference_answers_without_user_turn() -> anyhow::Result<()> {
    use llama_chat::model::{default_thread_count, llama::LlamaBackend, LlmBackend, SamplingParams};
    use llama_chat::prompt::build_prompt;
    use std::{env, fs, path::PathBuf};
    use walkdir::WalkDir;

    // Resolve model path: prefer $MODEL_PATH, else search ./models for any .gguf
    let model_path: PathBuf = env::var("MODEL_PATH")
        .ok()
        .map(PathBuf::from)
        .filter(|p| fs::metadata(p).is_ok())
        .or_else(|| {
            let root = PathBuf::from("./models");
            if fs::metadata(&root).is_ok() {
                for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
                    let p = entry.into_path();
                    if p.extension().and_then(|s| s.to_str()) == Some("gguf") {
                        return Some(p);
                    }
                }
            }
            None
        })
        .expect("No model found. Set MODEL_PATH or place a .gguf under ./models");

    let backend = LlamaBackend::new(model_path, 2048, default_thread_count(), 0)?;
    let params = SamplingParams::default();

    let completion = backend
        .complete(build_prompt("What is the capital of France?"), &params)
        .await?;

    assert_eq!(completion.choices.len(), 1);
    let text = &completion.choices[0].text;
    assert!(!text.contains("User:"), "stop sequence leaked: {text:?}");
    Ok(())
}

#[cfg(feature = "llama")]
#[test]
fn missing_model_fails_to_load() {
    use llama_chat::model::llama::LlamaBackend;

    let err = LlamaBackend::new("/definitely/not/here.gguf".into(), 4096, 1, 0)
        .err()
        .expect("loading a missing file must fail");
    assert!(err.to_string().contains("model file not found"));
}
