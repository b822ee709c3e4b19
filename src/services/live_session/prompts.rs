//! Oracle Prompts
//!
//! Prompt text for the LLM-backed oracles, one builder per task.

use interview_assist_core::{LanguageMode, RankedQuestion, RecommendedQuestion};

use super::state::FollowUpTurn;

/// System prompt shared by the interview tasks.
pub const CLINICAL_SYSTEM_PROMPT: &str = "You are an experienced clinician assisting a live \
patient interview in a bilingual (English / Swahili) clinic. Be concise and clinically precise.";

/// System prompt for the simulated patient.
pub const PATIENT_SYSTEM_PROMPT: &str = "You are role-playing a patient in a clinical interview. \
Answer only what is asked, briefly and realistically. Never give medical advice.";

/// System prompt for post-session follow-up questions.
pub const FOLLOW_UP_SYSTEM_PROMPT: &str = "You are a clinical reasoning assistant helping a \
clinician after a patient interview. Ground every answer in the session context below \
(transcript, summary and plan, unasked questions). If something is not in the transcript, say \
so and suggest what to ask or verify. Do not invent patient facts.";

pub fn scoring_prompt(context: &str, questions: &[String], language: LanguageMode) -> String {
    let list = questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    let instruction = match language {
        LanguageMode::Swahili => {
            "Pima kila swali kwa umuhimu wake katika kugundua ugonjwa hatari (0 hadi 1). \
             Toa alama za juu kwa maswali ambayo yakiachwa yanaweza kusababisha dalili hatari \
             (red flags) kukosekana au utambuzi usio sahihi, na ambayo yanahitajika sasa ili \
             kukamilisha historia ya mgonjwa.\n\n\
             Jibu kwa JSON pekee: [{\"question\":\"...\",\"score\":0.0,\"rationale\":\"...\"}]. \
             Tumia maandishi ya swali kama yalivyotolewa. Panga kutoka alama kubwa hadi ndogo. \
             Hakuna maelezo mengine."
        }
        _ => {
            "Score each question by how critical it is for diagnosing a serious condition \
             (0 to 1). Give the highest scores to questions whose omission risks missing a \
             red-flag symptom or a serious diagnosis, and that are needed now to complete the \
             history.\n\n\
             Reply with JSON only: [{\"question\":\"...\",\"score\":0.0,\"rationale\":\"...\"}]. \
             Copy each question text exactly as given. Sort by descending score. No other text."
        }
    };

    format!(
        "Conversation so far (most recent last):\n{}\n\nCandidate questions:\n{}\n\n{}",
        context, list, instruction
    )
}

pub fn recommendation_prompt(context: &str, language: LanguageMode) -> String {
    let instruction = match language {
        LanguageMode::English => {
            "Suggest the single most relevant next diagnostic question. Format: English: ..."
        }
        LanguageMode::Swahili => {
            "Pendekeza swali moja fupi la uchunguzi linalofuata. Format: Swahili: ..."
        }
        LanguageMode::Bilingual => {
            "Suggest the single most relevant next diagnostic question in both languages. \
             Format exactly as:\nEnglish: ...\n\nSwahili: ..."
        }
    };
    format!("{}\n\n{}", context, instruction)
}

pub fn patient_reply_prompt(question: &RecommendedQuestion, language: LanguageMode) -> String {
    match language {
        LanguageMode::English => format!(
            "Clinician: {}\n\nRespond in English as the patient. Be short and realistic.",
            question.english
        ),
        LanguageMode::Swahili => format!(
            "Clinician: {}\n\nJibu kwa Kiswahili kama mgonjwa. Toa jibu fupi na halisi.",
            question.swahili
        ),
        LanguageMode::Bilingual => format!(
            "Clinician: English: {} Swahili: {}\n\nRespond as the patient, in both languages \
             if you can. Be short and realistic.",
            question.english, question.swahili
        ),
    }
}

pub fn summary_prompt(transcript: &str, language: LanguageMode) -> String {
    let instruction = match language {
        LanguageMode::Swahili => {
            "Andika muhtasari wa mazungumzo haya kwa Kiswahili kwa nukta, kisha toa mpango wa \
             hatua kwa hatua wa kinachofuata kliniki. Tumia muundo huu:\n\n\
             **Swahili Summary:**\n- ...\n\n**FINAL PLAN:**\n- Step 1: ...\n- Step 2: ...\n\n\
             Kwa ufupi na kwa vitendo."
        }
        LanguageMode::English => {
            "Summarize this clinical conversation in English bullet points, then give a \
             practical step-by-step plan. Use this structure:\n\n\
             **English Summary:**\n- ...\n\n**FINAL PLAN:**\n- Step 1: ...\n- Step 2: ...\n\n\
             Keep it concise and actionable."
        }
        LanguageMode::Bilingual => {
            "Summarize this clinical conversation in English and in Swahili using bullet \
             points, then give a practical step-by-step plan. Use this structure and nothing \
             else:\n\n**English Summary:**\n- ...\n\n**Swahili Summary:**\n- ...\n\n\
             **FINAL PLAN:**\n- Step 1: ...\n- Step 2: ..."
        }
    };
    format!("{}\n\n{}", transcript, instruction)
}

/// Grounding block and language note for a follow-up question.
pub fn follow_up_context(
    transcript: &str,
    summary_and_plan: &str,
    unasked: &[RankedQuestion],
    language: LanguageMode,
) -> String {
    let language_note = match language {
        LanguageMode::Swahili => "Respond in Swahili.",
        LanguageMode::English => "Respond in English.",
        LanguageMode::Bilingual => {
            "Respond in English; brief Swahili clarifications are welcome where helpful."
        }
    };

    let unasked_lines = unasked
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {} (score={:.3})", i + 1, q.question, q.score))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{} {}\n\n=== SESSION TRANSCRIPT (most recent) ===\n{}\n\n\
         === SUMMARY + FINAL PLAN ===\n{}\n\n=== UNASKED QUESTIONS (ranked) ===\n{}",
        FOLLOW_UP_SYSTEM_PROMPT, language_note, transcript, summary_and_plan, unasked_lines
    )
}

/// Previous follow-up turns as "role: text" lines.
pub fn follow_up_history(turns: &[FollowUpTurn]) -> Option<String> {
    let lines: Vec<String> = turns
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|t| format!("{}: {}", t.role.as_str(), t.text.trim()))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(format!("Follow-up chat so far:\n{}", lines.join("\n")))
    }
}
