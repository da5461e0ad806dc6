//! Media Upload
//! 写真・動画のカテゴリ、制約チェック、オブジェクトストレージへのアップロード

use async_trait::async_trait;
use axum::body::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::VehicleType;

/// バケット名
pub const BUCKET: &str = "seller-uploads";

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 30 * 1024 * 1024;
pub const MAX_IMAGES_PER_CATEGORY: usize = 10;
pub const VIDEOS_PER_CATEGORY: usize = 1;

const IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png"];
const VIDEO_MIMES: &[&str] = &["video/mp4", "video/webm", "video/ogg"];

// ========================================
// Categories
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaCategory {
    Exterior,
    Interior,
    Tyres,
    Features,
    Front,
    Rear,
    Left,
    Right,
    Defects,
    Odometer,
    Walkaround,
}

const CAR_CATEGORIES: &[MediaCategory] = &[
    MediaCategory::Exterior,
    MediaCategory::Interior,
    MediaCategory::Tyres,
    MediaCategory::Features,
    MediaCategory::Defects,
    MediaCategory::Odometer,
    MediaCategory::Walkaround,
];

const BIKE_CATEGORIES: &[MediaCategory] = &[
    MediaCategory::Front,
    MediaCategory::Rear,
    MediaCategory::Left,
    MediaCategory::Right,
    MediaCategory::Defects,
    MediaCategory::Odometer,
    MediaCategory::Walkaround,
];

pub fn categories_for(vehicle: VehicleType) -> &'static [MediaCategory] {
    match vehicle {
        VehicleType::Car => CAR_CATEGORIES,
        VehicleType::Bike => BIKE_CATEGORIES,
    }
}

impl MediaCategory {
    pub fn name(&self) -> &'static str {
        match self {
            MediaCategory::Exterior => "Exterior",
            MediaCategory::Interior => "Interior",
            MediaCategory::Tyres => "Tyres",
            MediaCategory::Features => "Features",
            MediaCategory::Front => "Front",
            MediaCategory::Rear => "Rear",
            MediaCategory::Left => "Left",
            MediaCategory::Right => "Right",
            MediaCategory::Defects => "Defects",
            MediaCategory::Odometer => "Odometer",
            MediaCategory::Walkaround => "Walkaround",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaCategory::Walkaround => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    /// 車種のカテゴリ集合の中から名前で探す（大文字小文字は無視）
    pub fn parse(vehicle: VehicleType, name: &str) -> Option<Self> {
        categories_for(vehicle)
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

// ========================================
// Manifest
// ========================================

/// カテゴリ → 公開URL 一覧（セッションの正となるメディア一覧）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaManifest {
    pub urls: BTreeMap<String, Vec<String>>,
    pub file_names: BTreeMap<String, Vec<String>>,
}

impl MediaManifest {
    /// 車種に存在しないカテゴリを削除し、削除したカテゴリ名を返す
    pub fn retain_for(&mut self, vehicle: VehicleType) -> Vec<String> {
        let valid = |name: &str| MediaCategory::parse(vehicle, name).is_some();
        let dropped: Vec<String> = self
            .urls
            .keys()
            .chain(self.file_names.keys())
            .filter(|k| !valid(k))
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        self.urls.retain(|k, _| valid(k));
        self.file_names.retain(|k, _| valid(k));
        dropped
    }

    /// 固定カテゴリの写真オブジェクト（キーは小文字、欠けているカテゴリは空配列）
    pub fn photos_object(&self, vehicle: VehicleType) -> serde_json::Value {
        let mut photos = serde_json::Map::new();
        for category in categories_for(vehicle) {
            let urls = self.urls.get(category.name()).cloned().unwrap_or_default();
            photos.insert(category.name().to_lowercase(), serde_json::json!(urls));
        }
        serde_json::Value::Object(photos)
    }
}

// ========================================
// Errors
// ========================================

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Vehicle type must be chosen before uploading media")]
    NoVehicle,
    #[error("Unknown {vehicle} category: {name}")]
    UnknownCategory { vehicle: VehicleType, name: String },
    #[error("{file}: unsupported type {mime} for {category}")]
    UnsupportedType { category: &'static str, file: String, mime: String },
    #[error("{file}: {size} bytes exceeds the {limit} byte limit for {category}")]
    TooLarge { category: &'static str, file: String, size: u64, limit: u64 },
    #[error("{category}: at most {limit} file(s) allowed, got {count}")]
    TooManyFiles { category: &'static str, limit: usize, count: usize },
    #[error("{file}: content does not match {mime}")]
    ContentMismatch { file: String, mime: String },
    #[error("Missing media for: {}", .0.join(", "))]
    MissingCategories(Vec<String>),
    #[error("Storage error: {0}")]
    Storage(String),
}

// ========================================
// Validation
// ========================================

/// multipart から受け取ったファイル
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub category: MediaCategory,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// 1 ファイルの MIME とサイズ
pub fn validate_file(
    category: MediaCategory,
    file_name: &str,
    mime: &str,
    size: u64,
) -> Result<(), MediaError> {
    let (allowed, limit) = match category.kind() {
        MediaKind::Image => (IMAGE_MIMES, MAX_IMAGE_BYTES),
        MediaKind::Video => (VIDEO_MIMES, MAX_VIDEO_BYTES),
    };
    if !allowed.contains(&mime) {
        return Err(MediaError::UnsupportedType {
            category: category.name(),
            file: file_name.to_string(),
            mime: mime.to_string(),
        });
    }
    if size > limit {
        return Err(MediaError::TooLarge {
            category: category.name(),
            file: file_name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// 画像の中身が宣言された MIME と一致するか
fn sniff_image(file: &IncomingFile) -> Result<(), MediaError> {
    if file.category.kind() != MediaKind::Image {
        return Ok(());
    }
    let expected = match file.content_type.as_str() {
        "image/png" => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    };
    match image::guess_format(&file.bytes) {
        Ok(found) if found == expected => Ok(()),
        _ => Err(MediaError::ContentMismatch {
            file: file.file_name.clone(),
            mime: file.content_type.clone(),
        }),
    }
}

/// アップロード前の一括チェック（全カテゴリ 1 件以上、件数上限、各ファイル制約）
pub fn validate_batch(vehicle: VehicleType, files: &[IncomingFile]) -> Result<(), MediaError> {
    for file in files {
        validate_file(
            file.category,
            &file.file_name,
            &file.content_type,
            file.bytes.len() as u64,
        )?;
        sniff_image(file)?;
    }

    let mut missing = Vec::new();
    for category in categories_for(vehicle) {
        let count = files.iter().filter(|f| f.category == *category).count();
        let limit = match category.kind() {
            MediaKind::Image => MAX_IMAGES_PER_CATEGORY,
            MediaKind::Video => VIDEOS_PER_CATEGORY,
        };
        if count == 0 {
            missing.push(category.name().to_string());
        } else if count > limit {
            return Err(MediaError::TooManyFiles {
                category: category.name(),
                limit,
                count,
            });
        }
    }
    if !missing.is_empty() {
        return Err(MediaError::MissingCategories(missing));
    }
    Ok(())
}

/// `temp/{vehicle}/{category}/{timestamp}-{seq}-{name}`（空白除去、パス区切りは除外）
///
/// `seq` はバッチ内の通し番号。同名ファイルが同じミリ秒に来ても別キーになる
pub fn object_key(
    vehicle: VehicleType,
    category: MediaCategory,
    file_name: &str,
    timestamp_ms: i64,
    seq: usize,
) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let sanitized: String = base.chars().filter(|c| !c.is_whitespace()).collect();
    format!(
        "temp/{}/{}/{}-{}-{}",
        vehicle,
        category.name().to_lowercase(),
        timestamp_ms,
        seq,
        sanitized
    )
}

// ========================================
// ObjectStore
// ========================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), MediaError>;
    fn public_url(&self, key: &str) -> String;
}

/// ローカルディスク上のバケット（`{base_data_dir}/seller-uploads`）
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_data_dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: base_data_dir.into().join(BUCKET),
            base_url: format!("{}/{}", public_base_url.trim_end_matches('/'), BUCKET),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), MediaError> {
        let target_path = self.root.join(key);
        if let Some(dir) = target_path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| MediaError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let mut file = fs::File::create(&target_path)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to create file: {}", e)))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to write file: {}", e)))?;

        info!("✅ File saved: {:?}", target_path);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

// ========================================
// Upload
// ========================================

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub category: String,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub manifest: MediaManifest,
    pub failed: Vec<FailedUpload>,
}

/// カテゴリ順に、カテゴリ内のファイルは並行にアップロードする
///
/// 失敗したファイルは manifest から除外して `failed` に記録（ロールバック・再試行なし）
pub async fn upload_all(
    store: Arc<dyn ObjectStore>,
    vehicle: VehicleType,
    files: Vec<IncomingFile>,
) -> UploadOutcome {
    let mut outcome = UploadOutcome::default();

    for category in categories_for(vehicle) {
        let batch: Vec<IncomingFile> = files
            .iter()
            .filter(|f| f.category == *category)
            .cloned()
            .collect();
        if batch.is_empty() {
            continue;
        }

        let mut tasks = JoinSet::new();
        for (idx, file) in batch.into_iter().enumerate() {
            let store = Arc::clone(&store);
            let key = object_key(
                vehicle,
                file.category,
                &file.file_name,
                chrono::Utc::now().timestamp_millis(),
                idx,
            );
            tasks.spawn(async move {
                let result = store
                    .put(&key, file.bytes, &file.content_type)
                    .await
                    .map(|_| store.public_url(&key));
                (idx, file.file_name, result)
            });
        }

        let mut done = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => done.push(entry),
                Err(e) => {
                    warn!("❌ Upload task failed for {}: {}", category.name(), e);
                    outcome.failed.push(FailedUpload {
                        category: category.name().to_string(),
                        file_name: String::new(),
                        error: e.to_string(),
                    });
                }
            }
        }
        done.sort_by_key(|(idx, _, _)| *idx);

        for (_, file_name, result) in done {
            match result {
                Ok(url) => {
                    outcome
                        .manifest
                        .urls
                        .entry(category.name().to_string())
                        .or_default()
                        .push(url);
                    outcome
                        .manifest
                        .file_names
                        .entry(category.name().to_string())
                        .or_default()
                        .push(file_name);
                }
                Err(e) => {
                    warn!("❌ Upload failed: {} / {}: {}", category.name(), file_name, e);
                    outcome.failed.push(FailedUpload {
                        category: category.name().to_string(),
                        file_name,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    info!(
        "Uploaded {} categories, {} failed file(s)",
        outcome.manifest.urls.len(),
        outcome.failed.len()
    );
    outcome
}
