//! AWS Textract asynchronous document analysis (FORMS + TABLES).
//!
//! Textract reads the document from S3; only [`DocumentRef::S3`] is accepted.
//! Completed results are paginated with `NextToken`, and all pages are
//! concatenated before the job is reported done.

use crate::analysis::{DocumentAnalyzer, DocumentRef, JobId, JobPoll};
use crate::blocks::{Block, BlockType, EntityType, Relationship, RelationshipType};
use crate::error::FormScanError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::types::{
    Block as WireBlock, DocumentLocation, FeatureType, JobStatus as WireStatus, S3Object,
};
use aws_sdk_textract::Client;
use tracing::debug;

pub struct TextractAnalyzer {
    client: Client,
}

impl TextractAnalyzer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from the default credential chain. `region` overrides the
    /// environment's region when given.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }

    /// Fetch every result page after the first.
    async fn remaining_blocks(
        &self,
        job_id: &JobId,
        mut next_token: Option<String>,
        blocks: &mut Vec<Block>,
    ) -> Result<(), FormScanError> {
        while let Some(token) = next_token.take() {
            let page = self
                .client
                .get_document_analysis()
                .job_id(job_id.as_str())
                .next_token(token)
                .send()
                .await
                .map_err(|e| poll_error(job_id, DisplayErrorContext(&e)))?;
            blocks.extend(page.blocks().iter().map(convert_block));
            next_token = page.next_token().map(str::to_string);
            debug!("Job {}: {} blocks so far", job_id, blocks.len());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentAnalyzer for TextractAnalyzer {
    async fn submit(&self, document: &DocumentRef) -> Result<JobId, FormScanError> {
        let DocumentRef::S3 { bucket, key } = document else {
            return Err(FormScanError::AnalysisSubmitFailed(format!(
                "Textract reads documents from S3, not {document}"
            )));
        };

        let location = DocumentLocation::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let resp = self
            .client
            .start_document_analysis()
            .document_location(location)
            .feature_types(FeatureType::Forms)
            .feature_types(FeatureType::Tables)
            .send()
            .await
            .map_err(|e| FormScanError::AnalysisSubmitFailed(DisplayErrorContext(&e).to_string()))?;

        resp.job_id()
            .map(JobId::from)
            .ok_or_else(|| FormScanError::AnalysisSubmitFailed("response carried no job id".into()))
    }

    async fn poll(&self, job_id: &JobId) -> Result<JobPoll, FormScanError> {
        let first = self
            .client
            .get_document_analysis()
            .job_id(job_id.as_str())
            .send()
            .await
            .map_err(|e| poll_error(job_id, DisplayErrorContext(&e)))?;

        match first.job_status() {
            Some(WireStatus::Succeeded) | Some(WireStatus::PartialSuccess) => {
                let mut blocks: Vec<Block> = first.blocks().iter().map(convert_block).collect();
                let next = first.next_token().map(str::to_string);
                self.remaining_blocks(job_id, next, &mut blocks).await?;
                Ok(JobPoll::done(blocks))
            }
            Some(WireStatus::Failed) => Ok(JobPoll::failed(
                first.status_message().unwrap_or("No data available"),
            )),
            Some(WireStatus::InProgress) => Ok(JobPoll::pending()),
            other => Err(poll_error(job_id, format!("unexpected job status {other:?}"))),
        }
    }
}

fn poll_error(job_id: &JobId, reason: impl ToString) -> FormScanError {
    FormScanError::AnalysisPollFailed {
        job_id: job_id.to_string(),
        reason: reason.to_string(),
    }
}

fn convert_block(b: &WireBlock) -> Block {
    Block {
        id: b.id().unwrap_or_default().to_string(),
        block_type: b
            .block_type()
            .map_or(BlockType::Other, |t| BlockType::from_wire(t.as_str())),
        text: b.text().map(str::to_string),
        entity_types: b
            .entity_types()
            .iter()
            .map(|e| EntityType::from_wire(e.as_str()))
            .collect(),
        relationships: b
            .relationships()
            .iter()
            .map(|r| Relationship {
                kind: r
                    .r#type()
                    .map_or(RelationshipType::Other, |t| RelationshipType::from_wire(t.as_str())),
                ids: r.ids().to_vec(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_textract::types::{
        BlockType as WireBlockType, EntityType as WireEntityType, Relationship as WireRel,
        RelationshipType as WireRelType,
    };

    #[test]
    fn converts_key_block() {
        let wire = WireBlock::builder()
            .id("k1")
            .block_type(WireBlockType::KeyValueSet)
            .entity_types(WireEntityType::Key)
            .relationships(
                WireRel::builder()
                    .r#type(WireRelType::Value)
                    .ids("v1")
                    .build(),
            )
            .relationships(
                WireRel::builder()
                    .r#type(WireRelType::Child)
                    .ids("w1")
                    .ids("w2")
                    .build(),
            )
            .build();

        let block = convert_block(&wire);
        assert!(block.is_key());
        assert_eq!(block.text, None);
        assert_eq!(
            block.first_relationship(RelationshipType::Value),
            Some(&["v1".to_string()][..])
        );
        assert_eq!(
            block.first_relationship(RelationshipType::Child).map(<[String]>::len),
            Some(2)
        );
    }

    #[test]
    fn unknown_wire_values_collapse() {
        let wire = WireBlock::builder()
            .id("q")
            .block_type(WireBlockType::Query)
            .build();
        assert_eq!(convert_block(&wire).block_type, BlockType::Other);
    }
}
