#[cfg(test)]
mod test;

use crate::{
    bson::{doc, Document},
    cmap::{Command, RawCommandResponse},
    error::Result,
    operation::Operation,
    options::CommandOption,
    results::ListDatabasesResult,
    sdam::ServerDescription,
    selection_criteria::{ReadPreference, SelectionCriteria},
};

/// A `listDatabases` command. It always runs against the `admin` database on a primary.
#[derive(Clone, Debug, Default)]
pub struct ListDatabases {
    filter: Option<Document>,
    options: Vec<CommandOption>,
}

impl ListDatabases {
    /// Lists the databases matching `filter`, or every database if no filter is given.
    pub fn new(filter: Option<Document>, options: Vec<CommandOption>) -> Self {
        Self { filter, options }
    }
}

impl Operation for ListDatabases {
    type O = ListDatabasesResult;
    const NAME: &'static str = "listDatabases";

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        let mut body = doc! {
            Self::NAME: 1,
        };
        if let Some(ref filter) = self.filter {
            body.insert("filter", filter.clone());
        }
        crate::options::apply_all(&self.options, &mut body);

        Ok(Command::new_read(
            Self::NAME,
            "admin",
            Some(ReadPreference::Primary),
            body,
        ))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        response.body()
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }

    fn selection_criteria(&self) -> Option<SelectionCriteria> {
        Some(ReadPreference::Primary.into())
    }
}
