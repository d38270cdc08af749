use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

use super::{RepoError, Repository};
use crate::models::{
    Aluno, AlunoChanges, AlunoFilter, Casa, CreateCasaRequest, CreateDisciplinaRequest,
    CreateTurmaRequest, Credentials, Disciplina, Matricula, NewAluno, NewProfessor, Professor,
    ProfessorChanges, Role, Turma, UpdateCasaRequest, UpdateDisciplinaRequest, UpdateTurmaRequest,
};

/// A stored identity row: public record plus password hash.
#[derive(Debug, Clone)]
struct Identity<T> {
    record: T,
    senha_hash: String,
}

#[derive(Debug, Clone)]
struct Secretario {
    id: i32,
    nome: String,
    email: String,
}

#[derive(Default)]
struct Tables {
    last_id: i32,
    secretarios: Vec<Identity<Secretario>>,
    professores: Vec<Identity<Professor>>,
    alunos: Vec<Identity<Aluno>>,
    casas: Vec<Casa>,
    turmas: Vec<Turma>,
    disciplinas: Vec<Disciplina>,
    matriculas: Vec<Matricula>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn casa_exists(&self, id: i32) -> bool {
        self.casas.iter().any(|c| c.id == id)
    }

    fn turma_exists(&self, id: i32) -> bool {
        self.turmas.iter().any(|t| t.id == id)
    }

    fn professor_exists(&self, id: i32) -> bool {
        self.professores.iter().any(|p| p.record.id == id)
    }

    fn check_aluno_refs(&self, casa_id: Option<i32>, turma_id: Option<i32>) -> Result<(), RepoError> {
        if casa_id.is_some_and(|id| !self.casa_exists(id)) {
            return Err(fk("alunos_casa_id_fkey"));
        }
        if turma_id.is_some_and(|id| !self.turma_exists(id)) {
            return Err(fk("alunos_turma_id_fkey"));
        }
        Ok(())
    }

    fn check_disciplina_refs(
        &self,
        professor_id: Option<i32>,
        turma_id: Option<i32>,
    ) -> Result<(), RepoError> {
        if professor_id.is_some_and(|id| !self.professor_exists(id)) {
            return Err(fk("disciplinas_professor_id_fkey"));
        }
        if turma_id.is_some_and(|id| !self.turma_exists(id)) {
            return Err(fk("disciplinas_turma_id_fkey"));
        }
        Ok(())
    }
}

fn fk(constraint: &str) -> RepoError {
    RepoError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

fn unique(field: &str) -> RepoError {
    RepoError::UniqueViolation {
        field: field.to_string(),
    }
}

fn sorted_by_nome<T: Clone>(rows: &[T], key: impl Fn(&T) -> (&str, i32)) -> Vec<T> {
    let mut out = rows.to_vec();
    out.sort_by(|a, b| key(a).cmp(&key(b)));
    out
}

/// InMemoryRepository
///
/// A `Repository` held entirely in memory that enforces the same unique, foreign-key
/// and cascade rules as the Postgres schema, failing with the same `RepoError`s.
/// Used by the test suites and for running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepoError> {
        self.tables
            .lock()
            .map_err(|_| RepoError::Other("in-memory store lock poisoned".to_string()))
    }

    /// Secretaries have no HTTP creation endpoint; they are provisioned directly.
    pub fn add_secretario(
        &self,
        nome: &str,
        email: &str,
        senha_hash: &str,
    ) -> Result<i32, RepoError> {
        let mut t = self.tables()?;
        if t.secretarios.iter().any(|s| s.record.email == email) {
            return Err(unique("email"));
        }
        let id = t.next_id();
        t.secretarios.push(Identity {
            record: Secretario {
                id,
                nome: nome.to_string(),
                email: email.to_string(),
            },
            senha_hash: senha_hash.to_string(),
        });
        Ok(id)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_credentials(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Credentials>, RepoError> {
        let t = self.tables()?;
        let found = match role {
            Role::Secretario => t
                .secretarios
                .iter()
                .find(|s| s.record.email == email)
                .map(|s| (s.record.id, s.record.nome.clone(), s.senha_hash.clone())),
            Role::Professor => t
                .professores
                .iter()
                .find(|p| p.record.email == email)
                .map(|p| (p.record.id, p.record.nome.clone(), p.senha_hash.clone())),
            Role::Aluno => t
                .alunos
                .iter()
                .find(|a| a.record.email == email)
                .map(|a| (a.record.id, a.record.nome.clone(), a.senha_hash.clone())),
        };
        Ok(found.map(|(id, nome, senha_hash)| Credentials {
            id,
            nome,
            email: email.to_string(),
            senha_hash,
            role,
        }))
    }

    async fn email_in_use(
        &self,
        email: &str,
        except: Option<(Role, i32)>,
    ) -> Result<bool, RepoError> {
        let t = self.tables()?;
        let skip = |role: Role, id: i32| except == Some((role, id));
        Ok(t
            .secretarios
            .iter()
            .any(|s| s.record.email == email && !skip(Role::Secretario, s.record.id))
            || t
                .professores
                .iter()
                .any(|p| p.record.email == email && !skip(Role::Professor, p.record.id))
            || t
                .alunos
                .iter()
                .any(|a| a.record.email == email && !skip(Role::Aluno, a.record.id)))
    }

    // --- ALUNOS ---

    async fn list_alunos(&self, filter: &AlunoFilter) -> Result<Vec<Aluno>, RepoError> {
        let t = self.tables()?;
        let mut alunos: Vec<Aluno> = t
            .alunos
            .iter()
            .map(|a| a.record.clone())
            .filter(|a| filter.casa_id.is_none_or(|id| a.casa_id == Some(id)))
            .filter(|a| filter.turma_id.is_none_or(|id| a.turma_id == Some(id)))
            .collect();
        alunos.sort_by(|a, b| (&a.nome, a.id).cmp(&(&b.nome, b.id)));
        Ok(alunos)
    }

    async fn get_aluno(&self, id: i32) -> Result<Option<Aluno>, RepoError> {
        let t = self.tables()?;
        Ok(t.alunos.iter().find(|a| a.record.id == id).map(|a| a.record.clone()))
    }

    async fn create_aluno(&self, aluno: NewAluno) -> Result<Aluno, RepoError> {
        let mut t = self.tables()?;
        if t.alunos.iter().any(|a| a.record.email == aluno.email) {
            return Err(unique("email"));
        }
        t.check_aluno_refs(aluno.casa_id, aluno.turma_id)?;
        let record = Aluno {
            id: t.next_id(),
            nome: aluno.nome,
            email: aluno.email,
            casa_id: aluno.casa_id,
            turma_id: aluno.turma_id,
        };
        t.alunos.push(Identity {
            record: record.clone(),
            senha_hash: aluno.senha_hash,
        });
        Ok(record)
    }

    async fn update_aluno(&self, id: i32, changes: AlunoChanges) -> Result<Aluno, RepoError> {
        let mut t = self.tables()?;
        let index = t
            .alunos
            .iter()
            .position(|a| a.record.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(email) = &changes.email {
            if t.alunos.iter().any(|a| a.record.id != id && &a.record.email == email) {
                return Err(unique("email"));
            }
        }
        t.check_aluno_refs(changes.casa_id, changes.turma_id)?;

        let row = &mut t.alunos[index];
        if let Some(nome) = changes.nome {
            row.record.nome = nome;
        }
        if let Some(email) = changes.email {
            row.record.email = email;
        }
        if let Some(hash) = changes.senha_hash {
            row.senha_hash = hash;
        }
        if changes.casa_id.is_some() {
            row.record.casa_id = changes.casa_id;
        }
        if changes.turma_id.is_some() {
            row.record.turma_id = changes.turma_id;
        }
        Ok(row.record.clone())
    }

    async fn delete_aluno(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        let before = t.alunos.len();
        t.alunos.retain(|a| a.record.id != id);
        if t.alunos.len() == before {
            return Err(RepoError::NotFound);
        }
        // matriculas.aluno_id is ON DELETE CASCADE.
        t.matriculas.retain(|m| m.aluno_id != id);
        Ok(())
    }

    // --- PROFESSORES ---

    async fn list_professores(&self) -> Result<Vec<Professor>, RepoError> {
        let t = self.tables()?;
        let rows: Vec<Professor> = t.professores.iter().map(|p| p.record.clone()).collect();
        Ok(sorted_by_nome(&rows, |p| (p.nome.as_str(), p.id)))
    }

    async fn get_professor(&self, id: i32) -> Result<Option<Professor>, RepoError> {
        let t = self.tables()?;
        Ok(t
            .professores
            .iter()
            .find(|p| p.record.id == id)
            .map(|p| p.record.clone()))
    }

    async fn create_professor(&self, professor: NewProfessor) -> Result<Professor, RepoError> {
        let mut t = self.tables()?;
        if t.professores.iter().any(|p| p.record.email == professor.email) {
            return Err(unique("email"));
        }
        let record = Professor {
            id: t.next_id(),
            nome: professor.nome,
            email: professor.email,
        };
        t.professores.push(Identity {
            record: record.clone(),
            senha_hash: professor.senha_hash,
        });
        Ok(record)
    }

    async fn update_professor(
        &self,
        id: i32,
        changes: ProfessorChanges,
    ) -> Result<Professor, RepoError> {
        let mut t = self.tables()?;
        let index = t
            .professores
            .iter()
            .position(|p| p.record.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(email) = &changes.email {
            if t
                .professores
                .iter()
                .any(|p| p.record.id != id && &p.record.email == email)
            {
                return Err(unique("email"));
            }
        }

        let row = &mut t.professores[index];
        if let Some(nome) = changes.nome {
            row.record.nome = nome;
        }
        if let Some(email) = changes.email {
            row.record.email = email;
        }
        if let Some(hash) = changes.senha_hash {
            row.senha_hash = hash;
        }
        Ok(row.record.clone())
    }

    async fn delete_professor(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        if !t.professor_exists(id) {
            return Err(RepoError::NotFound);
        }
        if t.disciplinas.iter().any(|d| d.professor_id == Some(id)) {
            return Err(fk("disciplinas_professor_id_fkey"));
        }
        t.professores.retain(|p| p.record.id != id);
        Ok(())
    }

    async fn alunos_of_professor(&self, professor_id: i32) -> Result<Vec<Aluno>, RepoError> {
        let t = self.tables()?;
        let taught: Vec<i32> = t
            .disciplinas
            .iter()
            .filter(|d| d.professor_id == Some(professor_id))
            .map(|d| d.id)
            .collect();
        let rows: Vec<Aluno> = t
            .alunos
            .iter()
            .filter(|a| {
                t.matriculas
                    .iter()
                    .any(|m| m.aluno_id == a.record.id && taught.contains(&m.disciplina_id))
            })
            .map(|a| a.record.clone())
            .collect();
        Ok(sorted_by_nome(&rows, |a| (a.nome.as_str(), a.id)))
    }

    // --- CASAS ---

    async fn list_casas(&self) -> Result<Vec<Casa>, RepoError> {
        let t = self.tables()?;
        Ok(sorted_by_nome(&t.casas, |c| (c.nome.as_str(), c.id)))
    }

    async fn get_casa(&self, id: i32) -> Result<Option<Casa>, RepoError> {
        let t = self.tables()?;
        Ok(t.casas.iter().find(|c| c.id == id).cloned())
    }

    async fn create_casa(&self, req: CreateCasaRequest) -> Result<Casa, RepoError> {
        let mut t = self.tables()?;
        if t.casas.iter().any(|c| c.nome == req.nome) {
            return Err(unique("nome"));
        }
        let casa = Casa {
            id: t.next_id(),
            nome: req.nome,
            descricao: req.descricao,
        };
        t.casas.push(casa.clone());
        Ok(casa)
    }

    async fn update_casa(&self, id: i32, req: UpdateCasaRequest) -> Result<Casa, RepoError> {
        let mut t = self.tables()?;
        let index = t
            .casas
            .iter()
            .position(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(nome) = &req.nome {
            if t.casas.iter().any(|c| c.id != id && &c.nome == nome) {
                return Err(unique("nome"));
            }
        }
        let casa = &mut t.casas[index];
        if let Some(nome) = req.nome {
            casa.nome = nome;
        }
        if req.descricao.is_some() {
            casa.descricao = req.descricao;
        }
        Ok(casa.clone())
    }

    async fn delete_casa(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        if !t.casa_exists(id) {
            return Err(RepoError::NotFound);
        }
        if t.alunos.iter().any(|a| a.record.casa_id == Some(id)) {
            return Err(fk("alunos_casa_id_fkey"));
        }
        t.casas.retain(|c| c.id != id);
        Ok(())
    }

    // --- TURMAS ---

    async fn list_turmas(&self) -> Result<Vec<Turma>, RepoError> {
        let t = self.tables()?;
        let mut rows = t.turmas.clone();
        rows.sort_by(|a, b| (a.ano, &a.nome, a.id).cmp(&(b.ano, &b.nome, b.id)));
        Ok(rows)
    }

    async fn get_turma(&self, id: i32) -> Result<Option<Turma>, RepoError> {
        let t = self.tables()?;
        Ok(t.turmas.iter().find(|tu| tu.id == id).cloned())
    }

    async fn create_turma(&self, req: CreateTurmaRequest) -> Result<Turma, RepoError> {
        let mut t = self.tables()?;
        if t.turmas.iter().any(|tu| tu.nome == req.nome) {
            return Err(unique("nome"));
        }
        let turma = Turma {
            id: t.next_id(),
            nome: req.nome,
            ano: req.ano,
            turno: req.turno,
        };
        t.turmas.push(turma.clone());
        Ok(turma)
    }

    async fn update_turma(&self, id: i32, req: UpdateTurmaRequest) -> Result<Turma, RepoError> {
        let mut t = self.tables()?;
        let index = t
            .turmas
            .iter()
            .position(|tu| tu.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(nome) = &req.nome {
            if t.turmas.iter().any(|tu| tu.id != id && &tu.nome == nome) {
                return Err(unique("nome"));
            }
        }
        let turma = &mut t.turmas[index];
        if let Some(nome) = req.nome {
            turma.nome = nome;
        }
        if let Some(ano) = req.ano {
            turma.ano = ano;
        }
        if let Some(turno) = req.turno {
            turma.turno = turno;
        }
        Ok(turma.clone())
    }

    async fn delete_turma(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        if !t.turma_exists(id) {
            return Err(RepoError::NotFound);
        }
        if t.alunos.iter().any(|a| a.record.turma_id == Some(id)) {
            return Err(fk("alunos_turma_id_fkey"));
        }
        if t.disciplinas.iter().any(|d| d.turma_id == Some(id)) {
            return Err(fk("disciplinas_turma_id_fkey"));
        }
        t.turmas.retain(|tu| tu.id != id);
        Ok(())
    }

    // --- DISCIPLINAS ---

    async fn list_disciplinas(&self) -> Result<Vec<Disciplina>, RepoError> {
        let t = self.tables()?;
        Ok(sorted_by_nome(&t.disciplinas, |d| (d.nome.as_str(), d.id)))
    }

    async fn get_disciplina(&self, id: i32) -> Result<Option<Disciplina>, RepoError> {
        let t = self.tables()?;
        Ok(t.disciplinas.iter().find(|d| d.id == id).cloned())
    }

    async fn create_disciplina(
        &self,
        req: CreateDisciplinaRequest,
    ) -> Result<Disciplina, RepoError> {
        let mut t = self.tables()?;
        if t.disciplinas.iter().any(|d| d.nome == req.nome) {
            return Err(unique("nome"));
        }
        t.check_disciplina_refs(req.professor_id, req.turma_id)?;
        let disciplina = Disciplina {
            id: t.next_id(),
            nome: req.nome,
            carga_horaria: req.carga_horaria,
            professor_id: req.professor_id,
            turma_id: req.turma_id,
        };
        t.disciplinas.push(disciplina.clone());
        Ok(disciplina)
    }

    async fn update_disciplina(
        &self,
        id: i32,
        req: UpdateDisciplinaRequest,
    ) -> Result<Disciplina, RepoError> {
        let mut t = self.tables()?;
        if !t.disciplinas.iter().any(|d| d.id == id) {
            return Err(RepoError::NotFound);
        }
        if let Some(nome) = &req.nome {
            if t.disciplinas.iter().any(|d| d.id != id && &d.nome == nome) {
                return Err(unique("nome"));
            }
        }
        t.check_disciplina_refs(req.professor_id, req.turma_id)?;

        let disciplina = t
            .disciplinas
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(nome) = req.nome {
            disciplina.nome = nome;
        }
        if let Some(carga) = req.carga_horaria {
            disciplina.carga_horaria = carga;
        }
        if req.professor_id.is_some() {
            disciplina.professor_id = req.professor_id;
        }
        if req.turma_id.is_some() {
            disciplina.turma_id = req.turma_id;
        }
        Ok(disciplina.clone())
    }

    async fn delete_disciplina(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        if !t.disciplinas.iter().any(|d| d.id == id) {
            return Err(RepoError::NotFound);
        }
        if t.matriculas.iter().any(|m| m.disciplina_id == id) {
            return Err(fk("matriculas_disciplina_id_fkey"));
        }
        t.disciplinas.retain(|d| d.id != id);
        Ok(())
    }

    async fn disciplinas_of_aluno(&self, aluno_id: i32) -> Result<Vec<Disciplina>, RepoError> {
        let t = self.tables()?;
        let rows: Vec<Disciplina> = t
            .disciplinas
            .iter()
            .filter(|d| {
                t.matriculas
                    .iter()
                    .any(|m| m.aluno_id == aluno_id && m.disciplina_id == d.id)
            })
            .cloned()
            .collect();
        Ok(sorted_by_nome(&rows, |d| (d.nome.as_str(), d.id)))
    }

    // --- MATRICULAS ---

    async fn list_matriculas(&self) -> Result<Vec<Matricula>, RepoError> {
        let t = self.tables()?;
        let mut rows = t.matriculas.clone();
        rows.sort_by_key(|m| m.id);
        Ok(rows)
    }

    async fn get_matricula(&self, id: i32) -> Result<Option<Matricula>, RepoError> {
        let t = self.tables()?;
        Ok(t.matriculas.iter().find(|m| m.id == id).cloned())
    }

    async fn find_matricula(
        &self,
        aluno_id: i32,
        disciplina_id: i32,
    ) -> Result<Option<Matricula>, RepoError> {
        let t = self.tables()?;
        Ok(t
            .matriculas
            .iter()
            .find(|m| m.aluno_id == aluno_id && m.disciplina_id == disciplina_id)
            .cloned())
    }

    async fn create_matricula(
        &self,
        aluno_id: i32,
        disciplina_id: i32,
    ) -> Result<Matricula, RepoError> {
        let mut t = self.tables()?;
        if !t.alunos.iter().any(|a| a.record.id == aluno_id) {
            return Err(fk("matriculas_aluno_id_fkey"));
        }
        if !t.disciplinas.iter().any(|d| d.id == disciplina_id) {
            return Err(fk("matriculas_disciplina_id_fkey"));
        }
        if t
            .matriculas
            .iter()
            .any(|m| m.aluno_id == aluno_id && m.disciplina_id == disciplina_id)
        {
            return Err(unique("aluno_id_disciplina_id"));
        }
        let matricula = Matricula {
            id: t.next_id(),
            aluno_id,
            disciplina_id,
            created_at: Utc::now(),
        };
        t.matriculas.push(matricula.clone());
        Ok(matricula)
    }

    async fn delete_matricula(&self, id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        let before = t.matriculas.len();
        t.matriculas.retain(|m| m.id != id);
        if t.matriculas.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_enrollment(&self, aluno_id: i32, disciplina_id: i32) -> Result<(), RepoError> {
        let mut t = self.tables()?;
        let before = t.matriculas.len();
        t.matriculas
            .retain(|m| !(m.aluno_id == aluno_id && m.disciplina_id == disciplina_id));
        if t.matriculas.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Turno;

    #[tokio::test]
    async fn updating_missing_casa_with_taken_name_is_not_found() {
        let repo = InMemoryRepository::new();
        repo.create_casa(CreateCasaRequest {
            nome: "Grifinória".to_string(),
            descricao: None,
        })
        .await
        .unwrap();

        let err = repo
            .update_casa(
                999,
                UpdateCasaRequest {
                    nome: Some("Grifinória".to_string()),
                    descricao: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, RepoError::NotFound);
    }

    #[tokio::test]
    async fn updating_missing_turma_with_taken_name_is_not_found() {
        let repo = InMemoryRepository::new();
        repo.create_turma(CreateTurmaRequest {
            nome: "1A".to_string(),
            ano: 1,
            turno: Turno::Manha,
        })
        .await
        .unwrap();

        let err = repo
            .update_turma(
                999,
                UpdateTurmaRequest {
                    nome: Some("1A".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, RepoError::NotFound);
    }

    #[tokio::test]
    async fn renaming_casa_onto_another_name_is_unique_violation() {
        let repo = InMemoryRepository::new();
        repo.create_casa(CreateCasaRequest {
            nome: "Corvinal".to_string(),
            descricao: None,
        })
        .await
        .unwrap();
        let other = repo
            .create_casa(CreateCasaRequest {
                nome: "Lufa-Lufa".to_string(),
                descricao: None,
            })
            .await
            .unwrap();

        let err = repo
            .update_casa(
                other.id,
                UpdateCasaRequest {
                    nome: Some("Corvinal".to_string()),
                    descricao: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, unique("nome"));
    }
}
