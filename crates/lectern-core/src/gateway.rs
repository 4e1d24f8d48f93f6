//! Gateway facade wiring every service to one repository.

use std::sync::Arc;

use lectern_store::{ActionDispatcher, ContentClient};

use crate::config::GatewayConfig;
use crate::documents::DocumentService;
use crate::field_editor::FieldEditor;
use crate::formatter::{ParagraphFormatter, TextFormatter};
use crate::mutation::MutationService;
use crate::release::ReleaseManager;
use crate::subscription::SubscriptionRegistry;

pub struct Gateway {
    config: GatewayConfig,
    client: Arc<dyn ContentClient>,
    mutations: MutationService,
    fields: FieldEditor,
    releases: ReleaseManager,
    documents: DocumentService,
    subscriptions: SubscriptionRegistry,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        client: Arc<dyn ContentClient>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        let target = config.dataset_ref();
        tracing::info!(
            dataset = %target,
            api_version = %config.api_version,
            "gateway ready"
        );
        Self {
            mutations: MutationService::new(client.clone()),
            fields: FieldEditor::new(client.clone(), Arc::new(ParagraphFormatter)),
            releases: ReleaseManager::new(
                client.clone(),
                dispatcher.clone(),
                target.clone(),
                config.release_document_limit,
            ),
            documents: DocumentService::new(client.clone(), dispatcher, target),
            subscriptions: SubscriptionRegistry::new(
                client.clone(),
                config.subscription_idle_timeout,
            ),
            client,
            config,
        }
    }

    /// Swap the text formatter used by field edits.
    pub fn with_formatter(mut self, formatter: Arc<dyn TextFormatter>) -> Self {
        self.fields = FieldEditor::new(self.client.clone(), formatter);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn mutations(&self) -> &MutationService {
        &self.mutations
    }

    pub fn fields(&self) -> &FieldEditor {
        &self.fields
    }

    pub fn releases(&self) -> &ReleaseManager {
        &self.releases
    }

    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_store::fakes::MemoryContentLake;
    use serde_json::Value;

    struct Shouting;

    impl TextFormatter for Shouting {
        fn to_blocks(&self, text: &str) -> Vec<Value> {
            vec![Value::String(text.to_uppercase())]
        }
    }

    #[tokio::test]
    async fn services_share_the_repository() {
        let lake = Arc::new(MemoryContentLake::new());
        let gateway = Gateway::new(
            GatewayConfig::new("proj", "production"),
            lake.clone(),
            lake.clone(),
        )
        .with_formatter(Arc::new(Shouting));

        let id = gateway
            .documents()
            .create_draft("post", serde_json::Map::new())
            .await
            .unwrap();
        gateway
            .fields()
            .edit_field(crate::field_editor::FieldEditRequest {
                document_id: id.clone(),
                field: "body".to_string(),
                operations: vec![crate::field_editor::FieldOperation::Insert {
                    position: crate::field_editor::InsertAt::End,
                    index: None,
                    value: crate::field_editor::FieldValue::Text("hi".to_string()),
                }],
                if_revision_id: None,
            })
            .await
            .unwrap();

        let stored = lake.document(&id).unwrap();
        assert_eq!(stored.field("body"), Some(&serde_json::json!(["HI"])));
        assert_eq!(gateway.releases().document_limit(), 50);
        assert!(gateway.subscriptions().is_empty());
        assert_eq!(gateway.config().dataset, "production");
    }
}
