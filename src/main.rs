//! Application entry point — voice chat assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run) and apply the
//!    `API_KEY` environment override.
//! 3. Create the [`tokio`] runtime.
//! 4. Establish the conversation service and the pronunciation translator.
//! 5. Pick the speech engines the host supports.
//! 6. Spawn the conversation orchestrator.
//! 7. Run the console until `/quit` or end of input, then wait for the
//!    orchestrator to tear down.

use std::sync::Arc;

use anyhow::Context;
use voice_chat::{
    capture::{CommandRecognizer, SpeechRecognizer, UnsupportedRecognizer},
    config::{settings::API_KEY_ENV, AppConfig},
    console,
    conversation::{Orchestrator, Services},
    llm::{ApiStreamer, ApiTranslator, LlmError, PronunciationTranslator, ResponseStreamer},
    playback::{CommandSynthesizer, SpeechSynthesizer, UnsupportedSynthesizer},
};

// ---------------------------------------------------------------------------
// Service construction
// ---------------------------------------------------------------------------

/// Local endpoints (e.g. Ollama) do not need a key.
fn is_local_endpoint(base_url: &str) -> bool {
    ["://localhost", "://127.0.0.1", "://[::1]"]
        .iter()
        .any(|host| base_url.contains(host))
}

fn establish_chat(config: &AppConfig) -> Result<Arc<dyn ResponseStreamer>, LlmError> {
    if config.llm.api_key.is_none() && !is_local_endpoint(&config.llm.base_url) {
        return Err(LlmError::Request(format!(
            "no API key configured (set {API_KEY_ENV} or llm.api_key)"
        )));
    }
    let streamer = ApiStreamer::from_config(&config.llm, &config.chat)?;
    log::info!("Chat service ready: {}", config.llm.chat_model);
    Ok(Arc::new(streamer))
}

fn build_translator(config: &AppConfig) -> Option<Arc<dyn PronunciationTranslator>> {
    if !config.pronunciation.enabled {
        return None;
    }
    match ApiTranslator::from_config(&config.llm, &config.pronunciation) {
        Ok(translator) => Some(Arc::new(translator)),
        Err(e) => {
            log::warn!("Pronunciation rendering unavailable ({e}); replies are spoken as written");
            None
        }
    }
}

fn build_recognizer(config: &AppConfig) -> Box<dyn SpeechRecognizer> {
    match CommandRecognizer::from_config(&config.capture) {
        Some(recognizer) => {
            log::info!("Speech recognition via {:?}", config.capture.command);
            Box::new(recognizer)
        }
        None => {
            log::info!("No speech recognizer configured (capture.command); voice input disabled");
            Box::new(UnsupportedRecognizer)
        }
    }
}

fn build_synthesizer(config: &AppConfig) -> Box<dyn SpeechSynthesizer> {
    match CommandSynthesizer::from_config(&config.playback) {
        Some(synth) => {
            log::info!("Speech synthesis via {:?}", config.playback.command);
            Box::new(synth)
        }
        None => {
            log::info!("No speech synthesizer configured (playback.command); playback disabled");
            Box::new(UnsupportedSynthesizer)
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice chat starting up");

    // 2. Config
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_env();

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 4–5. Services
        let services = Services {
            streamer: establish_chat(&config),
            translator: build_translator(&config),
            recognizer: build_recognizer(&config),
            synthesizer: build_synthesizer(&config),
        };

        // 6. Orchestrator
        let (handle, task) = Orchestrator::new(services, &config).spawn();

        // 7. Console
        console::run(handle).await?;
        task.await.context("conversation task failed")?;
        log::info!("Voice chat shut down");
        Ok::<(), anyhow::Error>(())
    })
}
