//! One command per script line.
//!
//! Arguments are whitespace separated; double quotes group words
//! (`add-student 10 "Mary Ann" 20 1`). In optional positions `-` means
//! "not supplied".

use campusdb::registry::{
    College, CollegeChoice, CollegeId, CollegeUpdate, Course, CourseId, CourseUpdate, Student,
    StudentId, StudentUpdate,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type 'help' for the list of commands.")]
    Unknown(String),

    #[error("'{command}' expects {expected}")]
    Usage {
        command: String,
        expected: &'static str,
    },

    #[error("Invalid input '{0}'. Enter a number.")]
    InvalidNumber(String),

    #[error("Unterminated quote")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddStudent(Student),
    AddCollege(College),
    AddCourse(Course),
    SetCollegeChoice(StudentId, CollegeChoice),
    DeleteStudent(StudentId),
    DeleteCollege(CollegeId),
    DeleteCourse(CourseId),
    UpdateStudent(StudentId, StudentUpdate),
    UpdateCollege(CollegeId, CollegeUpdate),
    UpdateCourse(CourseId, CourseUpdate),
    AddCollegeAndAssign(College, StudentId),
    OfferCourse(CollegeId, CourseId),
    WithdrawCourse(CollegeId, CourseId),
    Enroll(StudentId, CourseId),
    Unenroll(StudentId, CourseId),
    ListStudents,
    ListColleges,
    ListCourses,
    StudentsOfCollege(CollegeId),
    CoursesOfCollege(CollegeId),
    CoursesOfStudent(StudentId),
    SearchStudents(String),
    StudentsPerCollege,
    AverageAgePerCollege,
    Commit,
    Rollback,
    Help,
    Exit,
}

pub const HELP: &str = "\
add-student <id> <name> <age> [college|-]
add-college <id> <name> <fees>
add-course <id> <name> <duration>
assign-college <student> <college>
clear-college <student>
delete-student <id> | delete-college <id> | delete-course <id>
update-student <id> <name|-> <age|->
update-college <id> <name|-> <fees|->
update-course <id> <name|-> <duration|->
add-college-assign <college-id> <name> <fees> <student>
offer-course <college> <course> | withdraw-course <college> <course>
enroll <student> <course> | unenroll <student> <course>
list-students | list-colleges | list-courses
students-of-college <college> | courses-of-college <college>
courses-of-student <student>
search <name-fragment>
report-students-per-college | report-average-age
commit | rollback | help | exit";

impl Command {
    /// `Ok(None)` for blank lines and `#` comments
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let tokens = tokenize(line)?;
        let Some((name, rest)) = tokens.split_first() else {
            return Ok(None);
        };
        if name.starts_with('#') {
            return Ok(None);
        }
        let args = Args {
            command: name,
            tokens: rest,
        };

        let command = match name.as_str() {
            "add-student" => {
                args.arity(3, 4, "<id> <name> <age> [college|-]")?;
                Command::AddStudent(Student {
                    id: StudentId(args.int(0)?),
                    name: args.text(1),
                    age: args.int(2)?,
                    college_choice: args.opt_int(3)?.map(CollegeId),
                })
            }
            "add-college" => {
                args.exact(3, "<id> <name> <fees>")?;
                Command::AddCollege(args.college(0)?)
            }
            "add-course" => {
                args.exact(3, "<id> <name> <duration>")?;
                Command::AddCourse(Course {
                    id: CourseId(args.int(0)?),
                    name: args.text(1),
                    duration: args.int(2)?,
                })
            }
            "assign-college" | "update-college-choice" => {
                args.exact(2, "<student> <college>")?;
                Command::SetCollegeChoice(
                    StudentId(args.int(0)?),
                    CollegeChoice::Set(CollegeId(args.int(1)?)),
                )
            }
            "clear-college" => {
                args.exact(1, "<student>")?;
                Command::SetCollegeChoice(StudentId(args.int(0)?), CollegeChoice::Clear)
            }
            "delete-student" => {
                args.exact(1, "<id>")?;
                Command::DeleteStudent(StudentId(args.int(0)?))
            }
            "delete-college" => {
                args.exact(1, "<id>")?;
                Command::DeleteCollege(CollegeId(args.int(0)?))
            }
            "delete-course" => {
                args.exact(1, "<id>")?;
                Command::DeleteCourse(CourseId(args.int(0)?))
            }
            "update-student" => {
                args.exact(3, "<id> <name|-> <age|->")?;
                Command::UpdateStudent(
                    StudentId(args.int(0)?),
                    StudentUpdate {
                        name: args.opt_text(1),
                        age: args.opt_int(2)?,
                    },
                )
            }
            "update-college" => {
                args.exact(3, "<id> <name|-> <fees|->")?;
                Command::UpdateCollege(
                    CollegeId(args.int(0)?),
                    CollegeUpdate {
                        name: args.opt_text(1),
                        fees: args.opt_int(2)?,
                    },
                )
            }
            "update-course" => {
                args.exact(3, "<id> <name|-> <duration|->")?;
                Command::UpdateCourse(
                    CourseId(args.int(0)?),
                    CourseUpdate {
                        name: args.opt_text(1),
                        duration: args.opt_int(2)?,
                    },
                )
            }
            "add-college-assign" => {
                args.exact(4, "<college-id> <name> <fees> <student>")?;
                Command::AddCollegeAndAssign(args.college(0)?, StudentId(args.int(3)?))
            }
            "offer-course" => {
                args.exact(2, "<college> <course>")?;
                Command::OfferCourse(CollegeId(args.int(0)?), CourseId(args.int(1)?))
            }
            "withdraw-course" => {
                args.exact(2, "<college> <course>")?;
                Command::WithdrawCourse(CollegeId(args.int(0)?), CourseId(args.int(1)?))
            }
            "enroll" => {
                args.exact(2, "<student> <course>")?;
                Command::Enroll(StudentId(args.int(0)?), CourseId(args.int(1)?))
            }
            "unenroll" => {
                args.exact(2, "<student> <course>")?;
                Command::Unenroll(StudentId(args.int(0)?), CourseId(args.int(1)?))
            }
            "students-of-college" => {
                args.exact(1, "<college>")?;
                Command::StudentsOfCollege(CollegeId(args.int(0)?))
            }
            "courses-of-college" => {
                args.exact(1, "<college>")?;
                Command::CoursesOfCollege(CollegeId(args.int(0)?))
            }
            "courses-of-student" => {
                args.exact(1, "<student>")?;
                Command::CoursesOfStudent(StudentId(args.int(0)?))
            }
            "search" => {
                args.exact(1, "<name-fragment>")?;
                Command::SearchStudents(args.text(0))
            }
            "list-students" => args.none(Command::ListStudents)?,
            "list-colleges" => args.none(Command::ListColleges)?,
            "list-courses" => args.none(Command::ListCourses)?,
            "report-students-per-college" => args.none(Command::StudentsPerCollege)?,
            "report-average-age" => args.none(Command::AverageAgePerCollege)?,
            "commit" => args.none(Command::Commit)?,
            "rollback" => args.none(Command::Rollback)?,
            "help" => args.none(Command::Help)?,
            "exit" | "quit" => args.none(Command::Exit)?,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

struct Args<'a> {
    command: &'a str,
    tokens: &'a [String],
}

impl Args<'_> {
    fn usage(&self, expected: &'static str) -> CommandError {
        CommandError::Usage {
            command: self.command.to_string(),
            expected,
        }
    }

    fn exact(&self, n: usize, expected: &'static str) -> Result<(), CommandError> {
        self.arity(n, n, expected)
    }

    fn arity(&self, min: usize, max: usize, expected: &'static str) -> Result<(), CommandError> {
        if (min..=max).contains(&self.tokens.len()) {
            Ok(())
        } else {
            Err(self.usage(expected))
        }
    }

    fn none(&self, command: Command) -> Result<Command, CommandError> {
        self.exact(0, "no arguments")?;
        Ok(command)
    }

    fn text(&self, idx: usize) -> String {
        self.tokens.get(idx).cloned().unwrap_or_default()
    }

    fn opt_text(&self, idx: usize) -> Option<String> {
        self.tokens.get(idx).filter(|t| t.as_str() != "-").cloned()
    }

    fn int(&self, idx: usize) -> Result<i64, CommandError> {
        let token = self.tokens.get(idx).map(String::as_str).unwrap_or_default();
        token
            .parse()
            .map_err(|_| CommandError::InvalidNumber(token.to_string()))
    }

    fn opt_int(&self, idx: usize) -> Result<Option<i64>, CommandError> {
        match self.tokens.get(idx).map(String::as_str) {
            None | Some("-") => Ok(None),
            Some(_) => self.int(idx).map(Some),
        }
    }

    fn college(&self, start: usize) -> Result<College, CommandError> {
        Ok(College {
            id: CollegeId(self.int(start)?),
            name: self.text(start + 1),
            fees: self.int(start + 2)?,
        })
    }
}

fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
