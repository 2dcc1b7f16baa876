use std::collections::HashMap;
use std::sync::Arc;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use uuid::Uuid;
use crate::core::SourceFile;

/// 本地预览资源
///
/// 每个预览对应一个 `data:` URL，被替换或重置时回收。
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    entries: Arc<Mutex<HashMap<Uuid, String>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为图片或视频创建预览，其他类型返回 None
    pub fn create(&self, file: &SourceFile) -> Option<PreviewHandle> {
        if !(file.is_image() || file.is_video()) {
            return None;
        }

        let id = Uuid::new_v4();
        let data_url = format!(
            "data:{};base64,{}",
            file.mime_type(),
            STANDARD.encode(file.content())
        );
        self.entries.lock().insert(id, data_url);

        tracing::debug!(preview = %id, file = file.name(), "preview created");

        Some(PreviewHandle {
            id,
            store: self.clone(),
        })
    }

    /// 当前未回收的预览数
    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn revoke(&self, id: &Uuid) -> bool {
        self.entries.lock().remove(id).is_some()
    }
}

/// 预览句柄
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    id: Uuid,
    store: PreviewStore,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 回收后返回 None
    pub fn data_url(&self) -> Option<String> {
        self.store.entries.lock().get(&self.id).cloned()
    }

    pub fn is_live(&self) -> bool {
        self.store.entries.lock().contains_key(&self.id)
    }

    /// 回收预览，重复调用无副作用
    pub fn revoke(&self) {
        if self.store.revoke(&self.id) {
            tracing::debug!(preview = %self.id, "preview revoked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_preview_data_url() {
        let store = PreviewStore::new();
        let file = SourceFile::new("a.png", "image/png", vec![1u8, 2, 3]);

        let handle = store.create(&file).unwrap();
        assert_eq!(handle.data_url().unwrap(), "data:image/png;base64,AQID");
        assert_eq!(store.live_count(), 1);

        handle.revoke();
        handle.revoke();
        assert!(handle.data_url().is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_no_preview_for_documents() {
        let store = PreviewStore::new();
        let file = SourceFile::new("notes.pdf", "application/pdf", vec![1u8]);

        assert!(store.create(&file).is_none());
        assert_eq!(store.live_count(), 0);
    }
}
