//! End-to-end turns through the assembled context, with a scripted model.
//!
//! upload -> relocate -> envelope -> session -> dispatch -> tools -> reply

use async_trait::async_trait;
use sahayak_agent::{Coordinator, HandlerDeps};
use sahayak_config::AppConfig;
use sahayak_core::{
    ErrorKind, Message, MessageToolCall, Provider, ProviderError, ProviderRequest, ProviderResponse,
    QueryHints, SessionId, UserId,
};
use sahayak_runtime::{AppContext, AttachmentSource, LocalRegistry, QueryRequest};
use sahayak_storage::InMemoryObjectStore;
use sahayak_tools::{Calendar, InMemoryCalendar, PlainTextRenderer, offset_from_minutes};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedModel {
    script: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedModel {
    fn new(script: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front().ok_or(ProviderError::ApiError {
            status_code: 500,
            message: "script exhausted".into(),
        })
    }
}

fn text(content: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(content),
        usage: None,
        model: "scripted".into(),
    }
}

fn tool_call(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls.push(MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: args.to_string(),
    });
    ProviderResponse {
        message,
        usage: None,
        model: "scripted".into(),
    }
}

async fn started(model: Arc<ScriptedModel>) -> (AppContext, Arc<InMemoryObjectStore>) {
    let mut config = AppConfig::default();
    config.routing.classifier = "keyword".into();

    let store = Arc::new(InMemoryObjectStore::new("sahayak-e2e"));
    let deps = HandlerDeps {
        provider: model,
        store: store.clone(),
        renderer: Arc::new(PlainTextRenderer),
        calendar: Calendar::new(Arc::new(InMemoryCalendar::new()), offset_from_minutes(330)),
    };
    let coordinator = Arc::new(Coordinator::from_config(&config, &deps));
    let registry = Arc::new(LocalRegistry::new("sahayak", coordinator));
    let ctx = AppContext::with_parts(config, deps, registry);
    ctx.start().await.unwrap();
    (ctx, store)
}

#[tokio::test]
async fn worksheet_from_an_uploaded_syllabus() {
    let model = ScriptedModel::new(vec![
        tool_call(
            "publish_worksheet",
            serde_json::json!({
                "title": "Plants",
                "content": "True or False\n1. Plants make their own food."
            }),
        ),
        text("Done."),
    ]);
    let (ctx, store) = started(model.clone()).await;
    let user = UserId::from("t1");

    ctx.assistant
        .upload_attachment(&user, "syllabus.png", vec![0x89, b'P', b'N', b'G'])
        .await
        .unwrap();

    let request = QueryRequest::text("t1", "", "Create a worksheet on plants for class 5")
        .with_attachment(AttachmentSource::Stored("syllabus.png".into()))
        .with_hints(QueryHints {
            target_audience: vec!["Grade 5".into()],
            ..QueryHints::default()
        });
    let reply = ctx.assistant.send_query(request).await.unwrap();

    assert_eq!(reply.role, "model");
    assert!(
        reply
            .message
            .starts_with("Your worksheet is ready. Download it here: https://storage.googleapis.com/sahayak-e2e/t1/generated/worksheet_"),
        "{}",
        reply.message
    );

    // The model saw the hinted text and the relocated image.
    let first = &model.requests()[0];
    let turn = first.messages.last().unwrap();
    assert_eq!(
        turn.content,
        "Create a worksheet on plants for class 5\nTarget Audience will be: Grade 5"
    );
    assert_eq!(turn.attachments.len(), 1);
    assert_eq!(turn.attachments[0].mime_type, "image/png");

    let names = store.object_names().await;
    assert!(!names.contains(&"t1/chat/uploaded/syllabus.png".to_string()));
    assert!(names.contains(&"t1/chat/processed/syllabus.png".to_string()));
    assert_eq!(
        names.iter().filter(|n| n.starts_with("t1/generated/worksheet_")).count(),
        1
    );

    // The turn was recorded in the lazily created session.
    let overview = ctx.sessions.list_with_latest_messages(&user).await.unwrap();
    assert_eq!(overview.sessions.len(), 1);
    assert_eq!(overview.messages.len(), 2);
    assert_eq!(overview.messages[1].role, "model");
    assert_eq!(overview.messages[1].message, reply.message);
}

#[tokio::test]
async fn a_relocated_attachment_cannot_be_sent_twice() {
    let model = ScriptedModel::new(vec![text("A leaf makes food from sunlight.")]);
    let (ctx, _store) = started(model.clone()).await;
    let user = UserId::from("t2");

    ctx.assistant
        .upload_attachment(&user, "leaf.jpg", vec![0xff, 0xd8, 0xff])
        .await
        .unwrap();

    let session = ctx.sessions.create(&user).await.unwrap();
    let first = QueryRequest {
        user_id: user.clone(),
        session_id: session.clone(),
        message: None,
        attachment: Some(AttachmentSource::Stored("leaf.jpg".into())),
        hints: QueryHints::default(),
    };
    let reply = ctx.assistant.send_query(first.clone()).await.unwrap();
    assert_eq!(reply.message, "A leaf makes food from sunlight.");

    let err = ctx.assistant.send_query(first).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn sessions_follow_the_conversation() {
    let model = ScriptedModel::new(vec![text("Hello! How can I help your class today?")]);
    let (ctx, _store) = started(model).await;
    let user = UserId::from("t3");

    let older = ctx.sessions.create(&user).await.unwrap();
    let newer = ctx.sessions.create(&user).await.unwrap();
    ctx.assistant
        .send_query(QueryRequest::text("t3", newer.clone(), "hello"))
        .await
        .unwrap();

    let messages = ctx.sessions.get_messages(&user, &newer).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "hello");
    assert!(ctx.sessions.get_messages(&user, &older).await.unwrap().is_empty());

    assert_eq!(ctx.sessions.delete(&user, &older).await.message(), "session deleted");
    assert_eq!(
        ctx.sessions.delete(&user, &SessionId::from("missing")).await.message(),
        "incorrect session details"
    );
    assert_eq!(ctx.sessions.list(&user).await.unwrap().len(), 1);
}
