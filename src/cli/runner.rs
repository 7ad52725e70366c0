//! Drives a [`Session`] from a command script and renders results as text.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use campusdb::registry::{Outcome, Session, SessionError, SessionResult};
use campusdb::StoreGateway;
use tracing::debug;

use super::command::{Command, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct App<G: StoreGateway> {
    session: Session<G>,
    echo: bool,
}

impl<G: StoreGateway> App<G> {
    pub fn new(session: Session<G>, echo: bool) -> Self {
        Self { session, echo }
    }

    #[cfg(test)]
    pub fn session_mut(&mut self) -> &mut Session<G> {
        &mut self.session
    }

    /// Read commands until `exit` or end of input.
    ///
    /// Malformed lines, rejections and failed reads are reported and the
    /// script goes on. A store fault during a write ends the run with an
    /// error after the session has rolled back.
    pub async fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        for (lineno, line) in input.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read line {}", lineno + 1))?;
            let parsed = Command::parse(&line);
            if self.echo && !matches!(parsed, Ok(None)) {
                writeln!(out, "> {}", line.trim())?;
            }
            let command = match parsed {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "{}", err)?;
                    continue;
                }
            };
            debug!(line = lineno + 1, ?command, "executing");

            match self.execute(command).await {
                Ok((lines, flow)) => {
                    for l in lines {
                        writeln!(out, "{}", l)?;
                    }
                    if flow == Flow::Exit {
                        break;
                    }
                }
                Err(err @ SessionError::Query(_)) => writeln!(out, "Error: {}", err)?,
                Err(err) => {
                    writeln!(out, "Error: {}", err)?;
                    return Err(err).context(format!("session terminated at line {}", lineno + 1));
                }
            }
        }
        Ok(())
    }

    /// Uncommitted work is discarded
    pub async fn finish(self) -> SessionResult<G> {
        self.session.finish().await
    }

    pub async fn execute(&mut self, command: Command) -> SessionResult<(Vec<String>, Flow)> {
        let s = &mut self.session;
        let lines = match command {
            Command::AddStudent(student) => {
                report(s.add_student(&student).await?, "Student added successfully!")
            }
            Command::AddCollege(college) => {
                report(s.add_college(&college).await?, "College added successfully!")
            }
            Command::AddCourse(course) => {
                report(s.add_course(&course).await?, "Course added successfully!")
            }
            Command::SetCollegeChoice(student, choice) => {
                let message = match choice {
                    campusdb::CollegeChoice::Set(_) => "College choice updated successfully!",
                    campusdb::CollegeChoice::Clear => "Student removed from college successfully!",
                };
                report(s.set_college_choice(student, choice).await?, message)
            }
            Command::DeleteStudent(id) => {
                report(s.delete_student(id).await?, "Student deleted successfully!")
            }
            Command::DeleteCollege(id) => {
                report(s.delete_college(id).await?, "College deleted successfully!")
            }
            Command::DeleteCourse(id) => {
                report(s.delete_course(id).await?, "Course deleted successfully!")
            }
            Command::UpdateStudent(id, changes) => report(
                s.update_student(id, &changes).await?,
                "Student details updated successfully!",
            ),
            Command::UpdateCollege(id, changes) => report(
                s.update_college(id, &changes).await?,
                "College details updated successfully!",
            ),
            Command::UpdateCourse(id, changes) => report(
                s.update_course(id, &changes).await?,
                "Course details updated successfully!",
            ),
            Command::AddCollegeAndAssign(college, student) => {
                let outcome = s.add_college_then_assign_student(&college, student).await?;
                let mut lines = Vec::new();
                if outcome.has_written() {
                    lines.push("College added successfully!".to_string());
                }
                lines.extend(report(outcome, "Student's college choice updated to new college!"));
                lines
            }
            Command::OfferCourse(college, course) => report(
                s.offer_course_at_college(college, course).await?,
                "Course added to college successfully!",
            ),
            Command::WithdrawCourse(college, course) => report(
                s.withdraw_course_from_college(college, course).await?,
                "Course removed from college successfully!",
            ),
            Command::Enroll(student, course) => report(
                s.enroll_student_in_course(student, course).await?,
                "Student enrolled in course successfully!",
            ),
            Command::Unenroll(student, course) => report(
                s.unenroll_student_from_course(student, course).await?,
                "Student removed from course successfully!",
            ),
            Command::ListStudents => listing("All Students:", s.list_students().await?),
            Command::ListColleges => listing("All Colleges:", s.list_colleges().await?),
            Command::ListCourses => listing("All Courses:", s.list_courses().await?),
            Command::SearchStudents(fragment) => {
                listing("Search Results:", s.search_students_by_name(&fragment).await?)
            }
            Command::StudentsOfCollege(college) => match s.students_of_college(college).await? {
                Ok(rows) => listing(&format!("Students in College {}:", college), rows),
                Err(rejection) => vec![rejection.to_string()],
            },
            Command::CoursesOfCollege(college) => match s.courses_of_college(college).await? {
                Ok(rows) => listing(&format!("Courses in College {}:", college), rows),
                Err(rejection) => vec![rejection.to_string()],
            },
            Command::CoursesOfStudent(student) => match s.courses_of_student(student).await? {
                Ok(rows) => listing(&format!("Enrolled Courses for Student {}:", student), rows),
                Err(rejection) => vec![rejection.to_string()],
            },
            Command::StudentsPerCollege => {
                let mut lines = vec!["Students per College Report:".to_string()];
                lines.extend(s.students_per_college().await?.into_iter().map(|row| {
                    format!("College ID: {}, Students: {}", row.college, row.students)
                }));
                lines
            }
            Command::AverageAgePerCollege => {
                let mut lines = vec!["Average Age per College Report:".to_string()];
                lines.extend(s.average_age_per_college().await?.into_iter().map(|row| {
                    format!("College ID: {}, Avg Age: {:?}", row.college, row.avg_age)
                }));
                lines
            }
            Command::Commit => {
                s.commit().await?;
                vec!["Changes committed.".to_string()]
            }
            Command::Rollback => {
                s.rollback().await?;
                vec!["Rolled back to last commit.".to_string()]
            }
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Exit => return Ok((vec!["Exiting program...".to_string()], Flow::Exit)),
        };
        Ok((lines, Flow::Continue))
    }
}

fn report(outcome: Outcome, success: &str) -> Vec<String> {
    let mut lines: Vec<String> = outcome.warnings().iter().map(ToString::to_string).collect();
    match outcome.rejection() {
        Some(rejection) => lines.push(rejection.to_string()),
        None => lines.push(success.to_string()),
    }
    lines
}

fn listing<T: std::fmt::Display>(title: &str, rows: Vec<T>) -> Vec<String> {
    std::iter::once(title.to_string())
        .chain(rows.iter().map(ToString::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusdb::{Connection, StoreConfig};

    async fn app() -> App<Connection> {
        let session = campusdb::open_session(&StoreConfig::in_memory()).await.unwrap();
        App::new(session, false)
    }

    async fn run_script(app: &mut App<Connection>, script: &str) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result = app.run(script.as_bytes(), &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_script_renders_messages_and_reports() {
        let mut app = app().await;
        let script = "\
# setup
add-college 1 Tech 1000
add-student 10 Amy 20 1
add-student 10 Bob 22 1
add-course 5 Algebra 4
enroll 10 5
report-average-age
list-students
";
        let (result, out) = run_script(&mut app, script).await;
        result.unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "College added successfully!",
                "Student added successfully!",
                "Student ID already exists.",
                "Course added successfully!",
                "Warning: Course may not be offered by student's college.",
                "Student enrolled in course successfully!",
                "Average Age per College Report:",
                "College ID: 1, Avg Age: 20.0",
                "All Students:",
                "ID: 10, Name: Amy, Age: 20, College: 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_lines_do_not_stop_the_script() {
        let mut app = app().await;
        let (result, out) = run_script(&mut app, "bogus\nenroll 1\nadd-course 5 Algebra 4\n").await;
        result.unwrap();
        assert!(out.contains("Unknown command 'bogus'"));
        assert!(out.contains("'enroll' expects"));
        assert!(out.ends_with("Course added successfully!\n"));
    }

    #[tokio::test]
    async fn test_add_college_assign_reports_each_step() {
        let mut app = app().await;
        let script = "\
add-student 10 Amy 20 -
add-college-assign 1 Tech 1000 10
add-college-assign 2 Arts 900 99
add-college-assign 1 Tech 1000 10
";
        let (result, out) = run_script(&mut app, script).await;
        result.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Student added successfully!",
                "College added successfully!",
                "Student's college choice updated to new college!",
                "College added successfully!",
                "Student not found.",
                "College ID already exists.",
            ]
        );
    }

    #[tokio::test]
    async fn test_echo_precedes_parse_errors() {
        let session = campusdb::open_session(&StoreConfig::in_memory()).await.unwrap();
        let mut app = App::new(session, true);
        let (result, out) = run_script(&mut app, "# note\nenroll 1\nlist-courses\n").await;
        result.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "> enroll 1");
        assert!(lines[1].starts_with("'enroll' expects"));
        assert_eq!(lines[2], "> list-courses");
        assert_eq!(lines[3], "All Courses:");
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn test_exit_stops_reading() {
        let mut app = app().await;
        let (result, out) = run_script(&mut app, "exit\nadd-course 5 Algebra 4\n").await;
        result.unwrap();
        assert_eq!(out, "Exiting program...\n");
    }

    #[tokio::test]
    async fn test_rollback_discards_uncommitted_rows() {
        let mut app = app().await;
        let script = "add-course 5 Algebra 4\ncommit\nadd-course 6 Physics 3\nrollback\nlist-courses\n";
        let (result, out) = run_script(&mut app, script).await;
        result.unwrap();
        assert!(out.contains("ID: 5, Name: Algebra, Duration: 4"));
        assert!(!out.contains("Physics"));
    }

    #[tokio::test]
    async fn test_lookup_on_missing_parent_is_reported() {
        let mut app = app().await;
        let (result, out) = run_script(&mut app, "courses-of-college 9\n").await;
        result.unwrap();
        assert_eq!(out, "College not found.\n");
    }

    #[tokio::test]
    async fn test_store_fault_ends_the_run() {
        let mut app = app().await;
        app.session_mut().gateway_mut().close().await.unwrap();

        let (result, out) = run_script(&mut app, "add-course 5 Algebra 4\nlist-courses\n").await;
        assert!(result.is_err());
        assert!(out.starts_with("Error:"));
        assert!(!out.contains("All Courses:"));
    }
}
