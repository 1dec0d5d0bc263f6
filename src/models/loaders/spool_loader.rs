use crate::models::submission::SubmissionRequest;
use crate::utils::mime::to_data_url;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 提交目录中单个 TOML 文件的原始形态
#[derive(Debug, Deserialize)]
pub struct SpoolEntry {
    /// 目标试卷 ID
    pub question_paper_id: i64,
    /// 答题文件路径（相对路径以 TOML 文件所在目录为基准）
    pub answer_file: String,
    /// 答题文件名，缺省时使用答题文件自身的文件名
    #[serde(default)]
    pub file_name: Option<String>,
}

/// 从 TOML 文件加载数据并转换为 SubmissionRequest 对象
///
/// 读出答题文件内容并编码为 data URL
pub async fn load_spool_entry(toml_file_path: &Path) -> Result<SubmissionRequest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let entry: SpoolEntry = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 相对路径以 TOML 文件所在目录为基准
    let answer_path = if Path::new(&entry.answer_file).is_relative() {
        toml_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&entry.answer_file)
    } else {
        PathBuf::from(&entry.answer_file)
    };

    let bytes = fs::read(&answer_path)
        .await
        .with_context(|| format!("无法读取答题文件: {}", answer_path.display()))?;

    let file_name = entry.file_name.unwrap_or_else(|| {
        answer_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    });

    Ok(SubmissionRequest {
        question_paper_id: entry.question_paper_id,
        file_name,
        file_content: to_data_url(&answer_path, &bytes),
        file_path: Some(toml_file_path.to_string_lossy().to_string()),
    })
}

/// 从文件夹中加载所有 TOML 文件并转换为 SubmissionRequest 对象列表
///
/// 单个文件加载失败只记录警告并跳过，不中断整个扫描
pub async fn load_spool_folder(folder_path: &str) -> Result<Vec<SubmissionRequest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut requests = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_spool_entry(&path).await {
                Ok(request) => {
                    tracing::info!(
                        "成功加载提交: 试卷 {} 文件 {}",
                        request.question_paper_id,
                        request.file_name
                    );
                    requests.push(request);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(requests)
}
