
use crate::{
    bson::{doc, Document},
    bson_util,
    cmap::{Command, RawCommandResponse},
    error::Result,
    operation::{batch_size, CursorSpecification, Operation, WriteConcernOnlyBody},
    options::CommandOption,
    sdam::ServerDescription,
    selection_criteria::SelectionCriteria,
    Namespace,
};

/// An `aggregate` command over a collection.
///
/// A pipeline whose last stage is `$out` or `$merge` writes its results to a collection; such a
/// pipeline is routed to a writable server and is subject to write concern acknowledgement.
#[derive(Clone, Debug)]
pub struct Aggregate {
    ns: Namespace,
    pipeline: Vec<Document>,
    options: Vec<CommandOption>,
}

impl Aggregate {
    /// Constructs an aggregation of `pipeline` over the collection `ns`.
    pub fn new(
        ns: Namespace,
        pipeline: impl IntoIterator<Item = Document>,
        options: Vec<CommandOption>,
    ) -> Self {
        Self {
            ns,
            pipeline: pipeline.into_iter().collect(),
            options,
        }
    }

    /// Whether the last stage of the pipeline writes its output to a collection.
    pub fn has_out_stage(&self) -> bool {
        self.pipeline
            .last()
            .and_then(bson_util::first_key)
            .map(|stage| stage == "$out" || stage == "$merge")
            .unwrap_or(false)
    }
}

impl Operation for Aggregate {
    type O = CursorSpecification;
    const NAME: &'static str = "aggregate";

    fn validate(&self) -> Result<()> {
        self.ns.validate()
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let mut cursor = Document::new();
        if !self.has_out_stage() {
            if let Some(batch_size) = batch_size(&self.options) {
                cursor.insert("batchSize", i64::from(batch_size));
            }
        }

        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "pipeline": bson_util::to_bson_array(&self.pipeline),
            "cursor": cursor,
        };
        crate::options::apply_all(
            self.options
                .iter()
                .filter(|option| !matches!(option, CommandOption::BatchSize(_))),
            &mut body,
        );

        if self.is_write() {
            Ok(Command::new_write(Self::NAME, self.ns.db.clone(), body))
        } else {
            Ok(Command::new_read(Self::NAME, self.ns.db.clone(), None, body))
        }
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        if self.is_write() {
            let write_concern: WriteConcernOnlyBody = response.body()?;
            write_concern.validate()?;
        }
        CursorSpecification::new(response, batch_size(&self.options))
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }

    fn is_write(&self) -> bool {
        self.has_out_stage()
    }

    fn selection_criteria(&self) -> Option<SelectionCriteria> {
        if self.has_out_stage() {
            Some(SelectionCriteria::writable())
        } else {
            None
        }
    }
}
