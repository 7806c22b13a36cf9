// Prompt text for the classifier, keyword builder, and playbook generator.
// The thread's `context` field is the semantic anchor for all of these.

use repwatch_store::{LabelCounts, Post, Thread};

/// Few-shot system instruction for batch sentiment classification. The model
/// must echo the ids back so the completion handler can route results without
/// positional bookkeeping.
pub const SENTIMENT_SYSTEM_INSTRUCTION: &str = r#"
You are an expert at judging the sentiment of short social and news content
toward a tracked topic. Consider:

* **Overall tone:** is the content predominantly positive, negative, or neutral?
* **Specific aspects:** service, quality, price, reliability, and how the author rates them.
* **Subjectivity:** judge the author's experience, not your own opinion.
* **Score:** between -1.0 (very negative) and 1.0 (very positive).
* **Magnitude:** between 0.0 and 1.0, the strength of the expressed feeling.
* **Label:** one of "positive", "negative", or "neutral".

Answer with JSON only, following the examples.

Example:
Content_ID: 100010001
Thread_ID: 10001
Platform_ID: twitter
Content: "Slightly happy with the new camera control button on this phone."
Output:
{
    "content_id": "100010001",
    "thread_id": "10001",
    "platform_id": "twitter",
    "sentiment": {
        "score": 0.4,
        "magnitude": 0.3,
        "label": "positive"
    }
}

Example:
Content_ID: 100010002
Thread_ID: 10001
Platform_ID: google-search
Content: "Tired of this product line, minor upgrades and nothing special."
Output:
{
    "content_id": "100010002",
    "thread_id": "10001",
    "platform_id": "google-search",
    "sentiment": {
        "score": -0.5,
        "magnitude": 0.6,
        "label": "negative"
    }
}
"#;

/// System preamble for the playbook generator.
pub const PR_EXPERT_SYSTEM: &str = "You are a public relations expert with extensive \
experience mitigating reputation incidents and deep knowledge of organizational \
strategy. You produce precise, actionable reports in strict JSON.";

/// The exact output shape the playbook generator must return. Top-level keys
/// are validated before anything is persisted.
pub const PLAYBOOK_JSON_FORMAT: &str = r#"{
    "report_name": "A creative name for this reputation report, five words or fewer.",
    "summary": "Key findings and data points, including reputational strengths and weaknesses.",
    "severity_assessment": "Evaluation of the potential impact on brand reputation.",
    "incident_categorization": {
        "category": "Category of the incident (e.g. unmet expectations, product failure).",
        "explanation": "Explanation for the chosen category."
    },
    "recommendations": {
        "response_strategy": "Communication plan to address concerns and manage public perception.",
        "performance_monitoring": "How to track the effectiveness of the response strategy.",
        "post_incident_analysis": "Process for reviewing the incident and improving future strategy.",
        "reputation_building": "Proactive measures to strengthen online reputation."
    }
}"#;

fn posts_digest(posts: &[Post]) -> String {
    let mut out = String::new();
    for p in posts {
        out.push_str(&format!(
            "- [{}/{}] score={:.2}: {}\n",
            p.post_id,
            p.platform_id,
            p.sentiment_score.unwrap_or(0.0),
            p.content
        ));
    }
    out
}

/// Assemble the playbook generation prompt from thread context and the
/// aggregated evidence.
pub fn playbook_prompt(
    thread: &Thread,
    counts: &LabelCounts,
    sentiment_level: Option<f64>,
    positive: &[Post],
    neutral: &[Post],
    negative: &[Post],
) -> String {
    let level = sentiment_level
        .map(|l| format!("{l:.1}"))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"Analyze the provided context and analytic data and produce a reputation report in JSON.

## Context
{context}

## Analytic data

Sentiment results are based on content collected from these platforms: {platforms}.

Positive records: {positive_count}
Negative records: {negative_count}
Neutral records: {neutral_count}

The sentiment level combines score and magnitude (0.7/0.3 weighted), normalized to [0, 100]
over the most recent one-hour window.

Sentiment level: {level}

**Top positive records**
{positive_posts}
**Top neutral records**
{neutral_posts}
**Top negative records**
{negative_posts}

## Instructions

Create a reputation report following this structure exactly:

{format}

Your report must adhere strictly to the JSON structure above, with every section populated
from the context and analytic data. Output the JSON object only.
"#,
        context = thread.context,
        platforms = thread.platform_ids.join(", "),
        positive_count = counts.positive,
        negative_count = counts.negative,
        neutral_count = counts.neutral,
        level = level,
        positive_posts = posts_digest(positive),
        neutral_posts = posts_digest(neutral),
        negative_posts = posts_digest(negative),
        format = PLAYBOOK_JSON_FORMAT,
    )
}

/// Prompt for building an X/Twitter API v2 search query from thread context.
pub fn twitter_query_prompt(context: &str, instructions: &str) -> String {
    format!(
        r#"You are an X/Twitter platform expert with extensive experience with the X API v2.
Build the single best search query string to retrieve the most relevant posts for the
context and instructions below.

Notes:
- Strictly follow the X API v2 query syntax.
- Return only the query string, with no explanation.

Example:
Context: A Category 4 hurricane struck the Gulf Coast in August 2017 with record rainfall.
Instructions: Collect posts discussing the hurricane; prioritize official sources; exclude retweets.
Query string:
has:geo (from:NWSNHC OR from:NHC_Atlantic) -is:retweet

Context:
{context}

Instructions:
{instructions}

Query string:
"#
    )
}

/// Prompt for generating Google search keywords as structured JSON.
pub fn google_keywords_prompt(context: &str, instructions: &str) -> String {
    format!(
        r#"You are a search expert. Analyze the context and instructions below and generate
Google search keywords.

Context:
{context}

Instructions:
{instructions}

Steps:
1. Identify the main topics and themes.
2. Generate primary keywords reflecting the most important topics.
3. Generate secondary keywords adding related terms and context.

Answer with a JSON object of this shape and nothing else:

{{
    "primary_keywords": ["keyword1", "keyword2"],
    "secondary_keywords": ["keyword3", "keyword4"]
}}
"#
    )
}
