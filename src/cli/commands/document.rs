use anyhow::{Context, Result};

use super::{emit, emit_list, Session};
use crate::cli::DocumentAction;
use crate::documents::NewDocument;

pub struct DocumentCommand<'a> {
    action: &'a DocumentAction,
}

impl<'a> DocumentCommand<'a> {
    pub fn new(action: &'a DocumentAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let documents = &session.desk.documents;
        let ctx = &session.ctx;

        match self.action {
            DocumentAction::Attach {
                parent_kind,
                parent,
                file,
                content_type,
            } => {
                let contents = tokio::fs::read(file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let file_name = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                emit(
                    documents
                        .attach(
                            ctx,
                            parent_kind.entity_ref(*parent),
                            NewDocument {
                                file_name,
                                content_type: content_type.clone(),
                                contents,
                            },
                        )
                        .await,
                )
            }
            DocumentAction::Discard { id } => emit(documents.discard(ctx, *id)),
            DocumentAction::Restore { id } => emit(documents.restore(ctx, *id)),
            DocumentAction::Delete { id } => emit(documents.permanently_delete(ctx, *id).await),
            DocumentAction::List {
                parent_kind,
                parent,
                all,
            } => {
                let parent = parent_kind.entity_ref(*parent);
                let listed = if *all {
                    documents.list_all(ctx, parent)
                } else {
                    documents.list_active(ctx, parent)
                };
                emit_list(listed.map(|docs| {
                    let count = docs.len();
                    (docs, count)
                }))
            }
        }
    }
}
