//! Built-in stage prompts.
//!
//! These are the shipping defaults; deployments override them through
//! `PromptStore::load_overrides`. Substitution slots: `{user_input}`,
//! `{rewritten_query}`, `{chat_history}`, `{content}`.

use super::PromptTemplate;
use crate::llm::ChatRole;

pub(super) fn builtin_prompts() -> Vec<(&'static str, PromptTemplate)> {
    vec![
        (
            "rewrite-query",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "You rewrite user questions about French higher-education programs \
                     into a single self-contained query. Resolve pronouns and implicit \
                     references using the conversation history. Keep the user's language. \
                     Output only the rewritten query, nothing else.\n\n\
                     Conversation history:\n{chat_history}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "query-classifier",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Classify the student's question into exactly one category:\n\
                     - \"program_selection\": the user wants program recommendations or \
                       comparisons (fields, schools, budgets, campuses, levels)\n\
                     - \"rules\": the user asks how admissions, visas, or the advisory \
                       service itself works\n\
                     - \"follow_up\": the user asks about something already shown in this \
                       conversation\n\
                     - \"general\": anything else\n\n\
                     Conversation history:\n{chat_history}\n\n\
                     Respond with a JSON object: {\"question_category\": \"<category>\"}"
                        .to_string(),
                ),
                (ChatRole::User, "{rewritten_query}".to_string()),
            ]),
        ),
        (
            "general-question",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "You are a friendly advisor for students exploring French \
                     higher-education programs. Answer the question helpfully and \
                     concisely in the user's language. If the question is unrelated to \
                     studies, gently steer back to program advice.\n\n\
                     Conversation history:\n{chat_history}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "follow-up-questions",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "The user is following up on programs already discussed in this \
                     conversation. Answer using only the conversation history below; do \
                     not invent programs that were never mentioned.\n\n\
                     Conversation history:\n{chat_history}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "rules-explainer",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Explain how French higher-education admissions and this advisory \
                     service work. Be factual and structured. If the user asks about \
                     something outside admissions rules, say so."
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "program-type-extraction",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Extract the program types the user is asking about. Valid types: \
                     \"PGE\", \"BTS\", \"BBA\", \"MIM\", \"MBA\", \"Other\", \
                     \"Bachelor\", \"Cycle prépa\", \"Cycle d'Ingénieur\", \
                     \"Cycle Préparatoire\", \"Programme d'Ingénieur\", \"Master\".\n\
                     If none is mentioned, return an empty list.\n\
                     Respond with a JSON object: {\"program_type\": [\"<type>\", ...]}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "price-campus-extraction",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Extract budget and campus constraints from the question. Fields:\n\
                     - price: tuition in euros, null if not mentioned\n\
                     - price_condition: \"gt\" if the user wants at least that price, \
                       \"lt\" for at most, null otherwise\n\
                     - languages: instruction languages mentioned (e.g. \"english\", \
                       \"french\"), null if none\n\
                     - primos_arrivant: true only if the user says they are newly \
                       arrived in France\n\
                     - school_rank: maximum acceptable school rank, null if not \
                       mentioned\n\
                     Respond with a JSON object containing exactly those fields."
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "retriever-intent",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Decide whether the user wants NEW programs they have not seen yet, \
                     or wants to REPEAT programs already shown in this conversation \
                     (e.g. \"show me those again\", \"the ones from before\").\n\n\
                     Conversation history:\n{chat_history}\n\n\
                     Respond with a JSON object: {\"retriever_intent\": \"NEW\"} or \
                     {\"retriever_intent\": \"REPEAT\"}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "entry-level-extraction",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "Extract the entry levels the user qualifies for, as metadata keys: \
                     \"bac\", \"bac_1\", \"bac_2\", \"bac_3\", \"bac_4\", \"bac_5\". \
                     Example: \"I just finished my licence\" -> [\"bac_3\"]. Return an \
                     empty list when no level is mentioned.\n\
                     Respond with a JSON object: {\"entry_level\": [\"<level>\", ...]}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
        (
            "grounded-advisor",
            PromptTemplate::new(vec![
                (
                    ChatRole::System,
                    "You are an advisor recommending French higher-education programs. \
                     Use only the program documents below. Begin with a short \
                     conversational introduction, then write the line \
                     ----program start---- and present each recommended program. For \
                     every program include a line \"School Logo: <url>\" and a line \
                     \"Program Link: <url>\" taken from its document, and end with \
                     \"Program Id: <id>\". If the documents are empty, apologize and \
                     ask the user to broaden their criteria.\n\n\
                     Program documents:\n{content}\n\n\
                     Conversation history:\n{chat_history}"
                        .to_string(),
                ),
                (ChatRole::User, "{user_input}".to_string()),
            ]),
        ),
    ]
}
