// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Defaults for the movie recommendations graph

/// Graph-expansion template: each candidate plot with its genres, cast,
/// directors and mean user rating
pub const MOVIE_TRAVERSAL: &str = "MATCH (node)<-[r:RATED]-()
RETURN
  node.title AS title, node.plot AS plot, score AS similarityScore,
  collect { MATCH (node)-[:IN_GENRE]->(g) RETURN g.name } AS genres,
  collect { MATCH (node)<-[:ACTED_IN]-(a) RETURN a.name } AS actors,
  collect { MATCH (node)<-[:DIRECTED]-(d) RETURN DISTINCT d.name } AS directors,
  avg(r.rating) AS userRating
ORDER BY userRating DESC";

pub const MOVIE_SCHEMA: &str = "Node properties:
Person {name: STRING, born: INTEGER}
Movie {tagline: STRING, title: STRING, released: INTEGER, plot: STRING, year: INTEGER}
Genre {name: STRING}
User {userId: INTEGER, name: STRING}

Relationship properties:
ACTED_IN {role: STRING}
RATED {rating: FLOAT, timestamp: INTEGER}

The relationships:
(:Person)-[:ACTED_IN]->(:Movie)
(:Person)-[:DIRECTED]->(:Movie)
(:User)-[:RATED]->(:Movie)
(:Movie)-[:IN_GENRE]->(:Genre)";

pub const MOVIE_EXAMPLES: &str = "USER INPUT: 'Get user ratings for a movie?' \
QUERY: MATCH (u:User)-[r:RATED]->(m:Movie) WHERE m.title = 'Movie Title' RETURN r.rating";
