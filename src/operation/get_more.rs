
use std::collections::VecDeque;

use serde::Deserialize;

use crate::{
    bson::{doc, Document},
    cmap::{Command, RawCommandResponse},
    error::{Error, Result},
    operation::Operation,
    options::CommandOption,
    sdam::ServerDescription,
    Namespace,
};

/// A `getMore` command, fetching the next batch of an open cursor.
#[derive(Debug)]
pub(crate) struct GetMore {
    ns: Namespace,
    cursor_id: i64,
    batch_size: Option<u32>,
    options: Vec<CommandOption>,
}

impl GetMore {
    pub(crate) fn new(ns: Namespace, cursor_id: i64, batch_size: Option<u32>) -> Self {
        Self {
            ns,
            cursor_id,
            batch_size,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GetMoreResult {
    pub(crate) batch: VecDeque<Document>,
    pub(crate) id: i64,
}

impl Operation for GetMore {
    type O = GetMoreResult;
    const NAME: &'static str = "getMore";

    fn validate(&self) -> Result<()> {
        self.ns.validate()
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let mut body = doc! {
            Self::NAME: self.cursor_id,
            "collection": self.ns.coll.clone(),
        };

        if let Some(batch_size) = self.batch_size {
            if batch_size > i32::MAX as u32 {
                return Err(Error::invalid_argument(
                    "The batch size must fit into a signed 32-bit integer",
                ));
            } else if batch_size != 0 {
                body.insert("batchSize", batch_size as i32);
            }
        }

        Ok(Command::new_read(Self::NAME, self.ns.db.clone(), None, body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        let response: GetMoreResponseBody = response.body()?;

        Ok(GetMoreResult {
            batch: response.cursor.next_batch,
            id: response.cursor.id,
        })
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }
}

#[derive(Debug, Deserialize)]
struct GetMoreResponseBody {
    cursor: NextBatchBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextBatchBody {
    id: i64,
    next_batch: VecDeque<Document>,
}
