
use crate::{
    bson::{doc, Document},
    cmap::{Command, RawCommandResponse},
    error::{Error, Result},
    operation::{batch_size, CursorSpecification, Operation},
    options::CommandOption,
    sdam::ServerDescription,
    Namespace,
};

/// A `find` command.
#[derive(Clone, Debug)]
pub struct Find {
    ns: Namespace,
    filter: Document,
    options: Vec<CommandOption>,
}

impl Find {
    /// Constructs a query for documents in `ns` matching `filter`.
    pub fn new(ns: Namespace, filter: Document, options: Vec<CommandOption>) -> Self {
        Self {
            ns,
            filter,
            options,
        }
    }
}

impl Operation for Find {
    type O = CursorSpecification;
    const NAME: &'static str = "find";

    fn validate(&self) -> Result<()> {
        self.ns.validate()?;
        let negative_limit = self
            .options
            .iter()
            .any(|option| matches!(option, CommandOption::Limit(limit) if *limit < 0));
        if negative_limit && batch_size(&self.options).is_some() {
            return Err(Error::invalid_argument(
                "a negative limit requests a single batch and cannot be combined with batchSize",
            ));
        }
        Ok(())
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "filter": self.filter.clone(),
        };
        crate::options::apply_all(&self.options, &mut body);

        Ok(Command::new_read(Self::NAME, self.ns.db.clone(), None, body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        CursorSpecification::new(response, batch_size(&self.options))
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }
}
