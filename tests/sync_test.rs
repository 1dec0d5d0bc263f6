use offline_answer_submit::clients::ExamApiClient;
use offline_answer_submit::models::{SubmissionPayload, SubmissionRequest};
use offline_answer_submit::orchestrator::drain_queue;
use offline_answer_submit::services::{Notifier, SyncRegistry, SUBMIT_ANSWER_TAG};
use offline_answer_submit::store::{Partition, SubmissionStore};
use offline_answer_submit::workflow::{CaptureFlow, CaptureOutcome, SubmissionCtx};
use offline_answer_submit::Config;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// 没有任何进程监听的本地端口，模拟网络不可达
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

fn request(paper_id: i64, file_name: &str) -> SubmissionRequest {
    SubmissionRequest {
        question_paper_id: paper_id,
        file_name: file_name.to_string(),
        file_content: "data:application/pdf;base64,AAA=".to_string(),
        file_path: None,
    }
}

fn payload(paper_id: i64, file_name: &str) -> SubmissionPayload {
    SubmissionPayload::from(&request(paper_id, file_name))
}

async fn open_store(dir: &TempDir) -> SubmissionStore {
    SubmissionStore::open(dir.path().join("queue.db").to_string_lossy().to_string())
        .await
        .expect("打开存储失败")
}

fn notifier_in(dir: &TempDir) -> Notifier {
    Notifier::with_path(dir.path().join("notify.txt").to_string_lossy().to_string())
}

fn capture_flow(client: ExamApiClient, store: SubmissionStore) -> (CaptureFlow, Arc<SyncRegistry>) {
    let registry = Arc::new(SyncRegistry::new());
    let flow = CaptureFlow::new(
        Arc::new(client),
        store,
        Arc::clone(&registry),
        &Config::default(),
    );
    (flow, registry)
}

async fn seed_queue(store: &SubmissionStore, payloads: &[SubmissionPayload]) {
    for payload in payloads {
        store
            .put(
                Partition::PendingSubmissions,
                None,
                serde_json::to_value(payload).expect("载荷序列化失败"),
            )
            .await
            .expect("预置队列失败");
    }
}

// ========== 捕获流程 ==========

#[tokio::test]
async fn test_capture_delivers_when_server_accepts() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let mut server = mockito::Server::new_async().await;
    let accept = server
        .mock("POST", "/api/submissions")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let store = open_store(&dir).await;
    let (flow, registry) = capture_flow(
        ExamApiClient::with_base_url(server.url(), "test-token"),
        store.clone(),
    );

    let outcome = flow
        .run(&request(7, "ans.pdf"), &SubmissionCtx::new(7, 1, "ans.pdf".to_string()))
        .await
        .expect("捕获失败");

    assert_eq!(outcome, CaptureOutcome::Delivered);
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        0,
        "直接送达的提交不应入队"
    );
    assert!(!registry.has_pending(), "直接送达不应注册同步标签");
    accept.assert_async().await;
}

#[tokio::test]
async fn test_capture_queues_when_network_unreachable() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;
    let (flow, registry) = capture_flow(
        ExamApiClient::with_base_url(DEAD_ENDPOINT, "test-token"),
        store.clone(),
    );

    let outcome = flow
        .run(&request(7, "ans.pdf"), &SubmissionCtx::new(7, 1, "ans.pdf".to_string()))
        .await
        .expect("断网时捕获也必须成功");

    assert_eq!(outcome, CaptureOutcome::Queued);
    assert!(registry.is_registered(SUBMIT_ANSWER_TAG));

    // 入队记录保持投递载荷的 camelCase 形态
    let records = store
        .get_all(Partition::PendingSubmissions)
        .await
        .expect("读取队列失败");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload["questionPaperId"], 7);
    assert_eq!(records[0].payload["fileName"], "ans.pdf");
    assert_eq!(records[0].payload["fileContent"], "data:application/pdf;base64,AAA=");
}

#[tokio::test]
async fn test_capture_queues_when_server_rejects() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let mut server = mockito::Server::new_async().await;
    let reject = server
        .mock("POST", "/api/submissions")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let store = open_store(&dir).await;
    let (flow, registry) = capture_flow(
        ExamApiClient::with_base_url(server.url(), "test-token"),
        store.clone(),
    );

    let outcome = flow
        .run(&request(7, "ans.pdf"), &SubmissionCtx::new(7, 1, "ans.pdf".to_string()))
        .await
        .expect("服务端拒绝时捕获也必须成功");

    // 拒绝同样转入队列，数据不静默丢失
    assert_eq!(outcome, CaptureOutcome::Queued);
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        1
    );
    assert!(registry.has_pending());
    reject.assert_async().await;
}

// ========== 后台同步 ==========

#[tokio::test]
async fn test_drain_delivers_all_and_empties_queue() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;
    seed_queue(&store, &[payload(1, "a.pdf"), payload(2, "b.pdf")]).await;

    let mut server = mockito::Server::new_async().await;
    let accept = server
        .mock("POST", "/api/submissions")
        .with_status(200)
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;

    let client = ExamApiClient::with_base_url(server.url(), "test-token");
    let notifier = notifier_in(&dir);

    let stats = drain_queue(&store, &client, &notifier).await.expect("同步失败");

    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.retained, 0);
    assert!(stats.is_drained());
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        0
    );
    accept.assert_async().await;

    // 每条送达的记录都留下一条通知
    let notify = std::fs::read_to_string(dir.path().join("notify.txt")).expect("通知文件应存在");
    assert_eq!(notify.matches("Submission Synced").count(), 2);
    assert!(notify.contains("a.pdf"));
    assert!(notify.contains("b.pdf"));
}

#[tokio::test]
async fn test_drain_retains_rejected_records_without_aborting() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;
    seed_queue(&store, &[payload(1, "a.pdf"), payload(2, "b.pdf")]).await;

    let mut server = mockito::Server::new_async().await;
    // 两条都必须尝试投递：单条失败不提前中止
    let reject = server
        .mock("POST", "/api/submissions")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let client = ExamApiClient::with_base_url(server.url(), "test-token");
    let stats = drain_queue(&store, &client, &notifier_in(&dir))
        .await
        .expect("同步失败");

    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.retained, 2);
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        2,
        "被拒绝的记录必须保留"
    );
    reject.assert_async().await;
    assert!(
        !dir.path().join("notify.txt").exists(),
        "没有送达就不应有通知"
    );
}

#[tokio::test]
async fn test_drain_keeps_only_the_rejected_record_in_a_mixed_pass() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;
    seed_queue(&store, &[payload(1, "first.pdf"), payload(2, "second.pdf")]).await;

    let mut server = mockito::Server::new_async().await;
    // 同一次触发内第一条被拒、第二条被接受
    let reject_first = server
        .mock("POST", "/api/submissions")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"fileName": "first.pdf"}"#.to_string(),
        ))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let accept_second = server
        .mock("POST", "/api/submissions")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"fileName": "second.pdf"}"#.to_string(),
        ))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let client = ExamApiClient::with_base_url(server.url(), "test-token");
    let stats = drain_queue(&store, &client, &notifier_in(&dir))
        .await
        .expect("同步失败");

    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retained, 1);

    // 留在队列里的只能是被拒绝的第一条
    let records = store
        .get_all(Partition::PendingSubmissions)
        .await
        .expect("读取队列失败");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload["fileName"], "first.pdf");
    reject_first.assert_async().await;
    accept_second.assert_async().await;
}

#[tokio::test]
async fn test_drain_recovers_after_server_failure() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;
    seed_queue(&store, &[payload(7, "ans.pdf")]).await;

    // 第一次触发：服务端 500，记录保留
    let mut bad_server = mockito::Server::new_async().await;
    let reject = bad_server
        .mock("POST", "/api/submissions")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let bad_client = ExamApiClient::with_base_url(bad_server.url(), "test-token");
    let notifier = notifier_in(&dir);

    let stats = drain_queue(&store, &bad_client, &notifier).await.expect("同步失败");
    assert_eq!(stats.retained, 1);
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        1
    );
    reject.assert_async().await;

    // 第二次触发：服务端恢复，同一条记录送达并出队
    let mut good_server = mockito::Server::new_async().await;
    let accept = good_server
        .mock("POST", "/api/submissions")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"questionPaperId": 7, "fileName": "ans.pdf"}"#.to_string(),
        ))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let good_client = ExamApiClient::with_base_url(good_server.url(), "test-token");

    let stats = drain_queue(&store, &good_client, &notifier).await.expect("同步失败");
    assert_eq!(stats.delivered, 1);
    assert!(stats.is_drained());
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        0
    );
    accept.assert_async().await;
}

#[tokio::test]
async fn test_drain_with_empty_queue_makes_no_network_calls() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;

    let mut server = mockito::Server::new_async().await;
    let never_called = server
        .mock("POST", "/api/submissions")
        .expect(0)
        .create_async()
        .await;

    let client = ExamApiClient::with_base_url(server.url(), "test-token");
    let stats = drain_queue(&store, &client, &notifier_in(&dir))
        .await
        .expect("空队列同步失败");

    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.retained, 0);
    never_called.assert_async().await;
}

#[tokio::test]
async fn test_drain_retains_unparseable_record() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let store = open_store(&dir).await;

    // 不是投递载荷形态的记录：跳过但保留，留给人工处理
    store
        .put(Partition::PendingSubmissions, None, json!({"weird": true}))
        .await
        .expect("预置队列失败");

    let mut server = mockito::Server::new_async().await;
    let never_called = server
        .mock("POST", "/api/submissions")
        .expect(0)
        .create_async()
        .await;

    let client = ExamApiClient::with_base_url(server.url(), "test-token");
    let stats = drain_queue(&store, &client, &notifier_in(&dir))
        .await
        .expect("同步失败");

    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.retained, 1);
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        1
    );
    never_called.assert_async().await;
}
