use offline_answer_submit::config::RouterConfig;
use offline_answer_submit::store::{Partition, SubmissionStore};
use offline_answer_submit::utils::logging;
use offline_answer_submit::{App, Config};
use std::path::Path;
use tempfile::TempDir;
use tokio::fs;

/// 没有任何进程监听的本地端口，模拟网络不可达
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

fn test_config(dir: &TempDir, endpoint: &str) -> Config {
    let root = dir.path();
    Config {
        api_base_url: endpoint.to_string(),
        store_path: root.join("queue.db").to_string_lossy().to_string(),
        cache_path: root.join("cache.db").to_string_lossy().to_string(),
        spool_folder: root.join("outbox").to_string_lossy().to_string(),
        notify_file: root.join("notify.txt").to_string_lossy().to_string(),
        router: RouterConfig {
            app_origin: endpoint.to_string(),
            ..RouterConfig::default()
        },
        ..Config::default()
    }
}

async fn write_spool_entry(spool: &Path, stem: &str, paper_id: i64) {
    fs::create_dir_all(spool).await.expect("创建提交目录失败");

    let answer_name = format!("{}.pdf", stem);
    fs::write(spool.join(&answer_name), b"%PDF-1.4 test")
        .await
        .expect("写入答题文件失败");

    let toml_body = format!(
        "question_paper_id = {}\nanswer_file = \"{}\"\n",
        paper_id, answer_name
    );
    fs::write(spool.join(format!("{}.toml", stem)), toml_body)
        .await
        .expect("写入TOML文件失败");
}

#[tokio::test]
async fn test_offline_capture_survives_restart_and_syncs_on_recovery() {
    logging::init();

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let spool = dir.path().join("outbox");
    write_spool_entry(&spool, "exam_42", 42).await;

    // 第一阶段：网络不可达，答卷应落入本地队列
    let offline_config = test_config(&dir, DEAD_ENDPOINT);
    App::initialize(offline_config.clone())
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("离线运行不应失败");

    {
        let store = SubmissionStore::open(offline_config.store_path.clone())
            .await
            .expect("打开存储失败");
        assert_eq!(
            store.count(Partition::PendingSubmissions).await.expect("计数失败"),
            1,
            "断网捕获的答卷应已入队"
        );
    }
    assert!(
        !spool.join("exam_42.toml").exists(),
        "入队后TOML文件应被清理"
    );
    assert!(
        !dir.path().join("notify.txt").exists(),
        "尚未同步不应有通知"
    );

    // 第二阶段：服务端恢复，重启应用后队列应自动清空
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/api/submissions")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"questionPaperId": 42}"#.to_string(),
        ))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let _health = server
        .mock("GET", "/api/health")
        .with_status(200)
        .create_async()
        .await;
    let _papers = server
        .mock("GET", "/api/question-papers")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 42, "title": "模拟考"}]"#)
        .create_async()
        .await;

    let online_config = test_config(&dir, &server.url());
    App::initialize(online_config.clone())
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("恢复后运行不应失败");

    submit.assert_async().await;

    let store = SubmissionStore::open(online_config.store_path.clone())
        .await
        .expect("打开存储失败");
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        0,
        "恢复后队列应已清空"
    );
    assert_eq!(
        store.count(Partition::CachedQuestionPapers).await.expect("计数失败"),
        1,
        "试卷快照应已刷新"
    );

    let notify = fs::read_to_string(&online_config.notify_file)
        .await
        .expect("同步完成后通知文件应存在");
    assert!(notify.contains("Submission Synced"));
    assert!(notify.contains("exam_42.pdf"));
}

#[tokio::test]
async fn test_degraded_mode_keeps_spool_file_when_capture_fails() {
    logging::init();

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let spool = dir.path().join("outbox");
    write_spool_entry(&spool, "exam_7", 7).await;

    // store_path 指向目录：存储必然打不开，应用降级为仅在线模式；
    // 加上网络不可达，捕获失败后TOML必须原地保留
    let mut config = test_config(&dir, DEAD_ENDPOINT);
    config.store_path = dir.path().to_string_lossy().to_string();

    App::initialize(config)
        .await
        .expect("降级初始化不应失败")
        .run()
        .await
        .expect("降级运行不应失败");

    assert!(
        spool.join("exam_7.toml").exists(),
        "捕获失败时TOML文件必须保留"
    );
    assert!(
        spool.join("exam_7.pdf").exists(),
        "捕获失败时答题文件必须保留"
    );
}

#[tokio::test]
async fn test_delivered_capture_leaves_queue_empty() {
    logging::init();

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let spool = dir.path().join("outbox");
    write_spool_entry(&spool, "exam_9", 9).await;

    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/api/submissions")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let _papers = server
        .mock("GET", "/api/question-papers")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let config = test_config(&dir, &server.url());
    App::initialize(config.clone())
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("运行失败");

    submit.assert_async().await;

    let store = SubmissionStore::open(config.store_path.clone())
        .await
        .expect("打开存储失败");
    assert_eq!(
        store.count(Partition::PendingSubmissions).await.expect("计数失败"),
        0,
        "直接送达不应留下队列记录"
    );
    assert!(!spool.join("exam_9.toml").exists(), "送达后TOML应被清理");
}

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_live_submission_round() {
    logging::init();

    // 使用环境变量配置真实服务端地址后手动运行
    let config = Config::from_env();

    App::initialize(config)
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("运行失败");
}
