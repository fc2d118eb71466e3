//! Turn driver: runs one conversation turn end to end and streams the
//! result.
//!
//! The driver owns the stage loop, the collaborators run the stages. Each
//! turn runs on its own task and communicates with the caller over a
//! bounded channel; the caller consumes events as they arrive and reads
//! the turn summary (exclusion bookkeeping, completion flag) afterwards.

use crate::agents::{
    classify_question, extract_filter_parameters, extract_program_ids, format_content,
    rewrite_query, stream_generation_branch, StageContext, FALLBACK_MESSAGE,
};
use crate::config::{Config, RetrievalConfig};
use crate::errors::Result;
use crate::llm::ModelSet;
use crate::prompts::PromptStore;
use crate::retriever::engine::DocumentRetriever;
use crate::retriever::filter::{build_search_params, RetrieverConfig};
use crate::retriever::RetrieverCache;
use crate::streaming::events::{ResponseType, StreamEvent};
use crate::streaming::ResponseAssembler;
use crate::types::{format_history, StoredMessage};
use crate::workflow::state::{next_stage, RetrieverIntent, Stage, TurnState};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Channel depth between the turn task and the consumer
const EVENT_BUFFER: usize = 32;

/// Everything the caller supplies for one turn
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub user_message: String,
    /// Ids of programs already shown in this conversation
    pub excluded_ids: Vec<String>,
    pub history: Vec<StoredMessage>,
    pub username: Option<String>,
}

/// Post-turn bookkeeping the caller persists between turns.
///
/// `completed` is true only when the turn actually yielded answer text;
/// a turn that failed mid-stream leaves it false so the caller does not
/// store a half answer.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub completed: bool,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub rewritten_query: Option<String>,
    /// Input exclusions plus the ids shown by this turn's answer
    pub excluded_ids: Vec<String>,
    pub response_type: ResponseType,
}

/// Consumer handle for one running turn
pub struct TurnStream {
    receiver: mpsc::Receiver<StreamEvent>,
    summary: Arc<Mutex<TurnSummary>>,
}

impl TurnStream {
    /// Next event, or `None` once the turn task is finished and drained.
    /// The last event of every turn is [`StreamEvent::Done`].
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Snapshot of the turn summary. Only stable after `Done` was observed.
    pub async fn summary(&self) -> TurnSummary {
        self.summary.lock().await.clone()
    }
}

/// The conversation workflow: rewrite, classify, route, and stream an
/// answer. Cheap to clone; every clone shares the retriever and prompts.
#[derive(Clone)]
pub struct Workflow {
    models: ModelSet,
    prompts: Arc<PromptStore>,
    retriever: Arc<dyn DocumentRetriever>,
    retrieval: RetrievalConfig,
}

impl Workflow {
    pub fn new(
        models: ModelSet,
        prompts: Arc<PromptStore>,
        retriever: Arc<dyn DocumentRetriever>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            models,
            prompts,
            retriever,
            retrieval,
        }
    }

    /// Build the production wiring from configuration: Ollama-backed
    /// models, built-in prompts, and the lazily-initialized retriever.
    pub fn connect(config: &Config) -> Result<Self> {
        let models = ModelSet::from_config(&config.llm)?;
        let retriever = Arc::new(RetrieverCache::new(config.clone())?);
        Ok(Self::new(
            models,
            Arc::new(PromptStore::with_defaults()),
            retriever,
            config.retrieval.clone(),
        ))
    }

    /// Start one turn on its own task and hand back the event stream.
    pub fn run_turn(&self, request: TurnRequest) -> TurnStream {
        let run_id = Uuid::new_v4().to_string();
        let summary = Arc::new(Mutex::new(TurnSummary {
            completed: false,
            run_id: run_id.clone(),
            started_at: Utc::now(),
            rewritten_query: None,
            excluded_ids: request.excluded_ids.clone(),
            response_type: ResponseType::default(),
        }));

        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
        let workflow = self.clone();
        let task_summary = summary.clone();
        tokio::spawn(async move {
            workflow.drive_turn(request, run_id, sender, task_summary).await;
        });

        TurnStream { receiver, summary }
    }

    async fn drive_turn(
        self,
        request: TurnRequest,
        run_id: String,
        sender: mpsc::Sender<StreamEvent>,
        summary: Arc<Mutex<TurnSummary>>,
    ) {
        info!(
            run_id = %run_id,
            user = request.username.as_deref().unwrap_or("anonymous"),
            "turn started"
        );

        let history = format_history(&request.history);
        let mut state = TurnState::new(request.user_message, history, request.excluded_ids);
        let ctx = StageContext {
            models: &self.models,
            prompts: &self.prompts,
        };

        // A failed rewrite is not fatal: the raw query flows downstream
        match rewrite_query(&ctx, &state.query, &state.history).await {
            Ok(rewritten) => state.rewritten_query = Some(rewritten),
            Err(e) => warn!(run_id = %run_id, error = %e, "query rewrite failed, using raw query"),
        }
        summary.lock().await.rewritten_query = state.rewritten_query.clone();

        let category = classify_question(&ctx, state.effective_query(), &state.history).await;
        state.question_category = Some(category);
        info!(run_id = %run_id, category = ?category, "question classified");

        let mut stage = next_stage(Stage::Classify, &state);
        while !stage.is_generation() {
            match stage {
                Stage::ExtractFilters => {
                    let filters =
                        extract_filter_parameters(&ctx, state.effective_query(), &state.history)
                            .await;
                    state.program_type = filters.program_type;
                    if let Some(info) = filters.price_campus_info {
                        state.price_campus_info = info;
                    }
                    if let Some(levels) = filters.entry_level {
                        state.entry_level = levels;
                    }
                    state.retriever_intent = filters.retriever_intent.unwrap_or_default();
                }
                Stage::Retrieve => {
                    let exclude = state.retriever_intent == RetrieverIntent::New;
                    let search_params = build_search_params(
                        state.program_type.as_deref().unwrap_or(&[]),
                        self.retrieval.k,
                        &state.excluded_ids,
                        &state.price_campus_info,
                        &state.entry_level,
                        exclude,
                        &self.retrieval,
                    );
                    let retriever_config = RetrieverConfig {
                        rewritten_query: state.effective_query().to_string(),
                        search_params,
                    };
                    let output = self.retriever.multiple_invoke(&retriever_config).await;
                    info!(run_id = %run_id, hits = output.ids.len(), "retrieval complete");
                    state.content = Some(output.content);
                }
                _ => {}
            }
            stage = next_stage(stage, &state);
        }

        let grounded = stage == Stage::GenerateGrounded;
        let response_type = if grounded {
            ResponseType::Programs
        } else {
            ResponseType::Text
        };
        summary.lock().await.response_type = response_type;

        let content = state.content.as_deref().map(format_content).unwrap_or_default();
        let mut stream = match stream_generation_branch(
            &ctx,
            stage,
            state.effective_query(),
            &state.history,
            &content,
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                // Could not even open the stream: apologize instead of
                // going silent.
                warn!(run_id = %run_id, error = %e, "generation stream failed to open");
                let _ = sender.send(StreamEvent::response_type(response_type)).await;
                let _ = sender.send(StreamEvent::text(FALLBACK_MESSAGE)).await;
                summary.lock().await.completed = true;
                let _ = sender
                    .send(StreamEvent::final_metadata(
                        Some(run_id),
                        state.rewritten_query,
                    ))
                    .await;
                let _ = sender.send(StreamEvent::Done).await;
                return;
            }
        };

        // Only grounded answers carry inline annotations worth reassembling
        let mut assembler = grounded.then(ResponseAssembler::new);
        let mut full_response = String::new();
        let mut announced = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    if !announced {
                        // Announce the answer kind once, before any text
                        if sender
                            .send(StreamEvent::response_type(response_type))
                            .await
                            .is_err()
                        {
                            return;
                        }
                        announced = true;
                    }
                    full_response.push_str(&delta);

                    let events = match assembler.as_mut() {
                        Some(assembler) => assembler.feed(&delta),
                        None => vec![StreamEvent::text(delta)],
                    };
                    for event in events {
                        if sender.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "generation stream failed mid-turn");
                    let _ = sender
                        .send(StreamEvent::Error {
                            run_id: Some(run_id.clone()),
                            message: e.to_string(),
                        })
                        .await;
                    let _ = sender.send(StreamEvent::Done).await;
                    return;
                }
            }
        }

        if let Some(assembler) = assembler.as_mut() {
            for event in assembler.finish() {
                if sender.send(event).await.is_err() {
                    return;
                }
            }
        }

        if grounded {
            let shown = extract_program_ids(&full_response);
            if !shown.is_empty() {
                info!(run_id = %run_id, shown = shown.len(), "programs recorded for exclusion");
                summary.lock().await.excluded_ids.extend(shown);
            }
        }

        let completed = !full_response.is_empty();
        state.response = Some(full_response);
        summary.lock().await.completed = completed;

        let _ = sender
            .send(StreamEvent::final_metadata(
                Some(run_id.clone()),
                state.rewritten_query.clone(),
            ))
            .await;
        let _ = sender.send(StreamEvent::Done).await;
        info!(run_id = %run_id, completed, "turn finished");
    }
}
