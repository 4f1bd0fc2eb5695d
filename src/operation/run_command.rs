
use crate::{
    bson::Document,
    bson_util,
    cmap::{Command, RawCommandResponse},
    error::{Error, Result},
    operation::Operation,
    options::CommandOption,
    sdam::ServerDescription,
};

/// An arbitrary command run against a database. The raw reply document is returned.
#[derive(Clone, Debug)]
pub struct RunCommand {
    db: String,
    command: Document,
    options: Vec<CommandOption>,
}

impl RunCommand {
    /// Runs `command` against the database `db`. The first key of `command` names the command.
    pub fn new(db: impl Into<String>, command: Document, options: Vec<CommandOption>) -> Self {
        Self {
            db: db.into(),
            command,
            options,
        }
    }

    fn command_name(&self) -> Option<&str> {
        bson_util::first_key(&self.command)
    }
}

impl Operation for RunCommand {
    type O = Document;
    const NAME: &'static str = "runCommand";

    fn validate(&self) -> Result<()> {
        if self.db.is_empty() {
            return Err(Error::invalid_argument(
                "a command must target a non-empty database name",
            ));
        }
        if self.command_name().is_none() {
            return Err(Error::invalid_argument(
                "an empty document cannot be passed to a run_command operation",
            ));
        }
        Ok(())
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let name = self.command_name().unwrap_or(Self::NAME).to_string();
        let mut body = self.command.clone();
        crate::options::apply_all(&self.options, &mut body);

        Ok(Command::new_read(name, self.db.clone(), None, body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        response.raw_body()
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }
}
